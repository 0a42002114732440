//! Region profiling: partitions a pattern's search key into
//! index-queryable regions and schedules how hard each is filtered
//! (spec.md §3 "Region profile", §4.C).

use crate::index::Index;
use crate::index::dna_text::Base;

#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum RegionKind {
    Unique,
    Standard,
    Gap,
}

#[derive(Clone, Copy, Debug)]
pub struct Region {
    pub begin: usize,
    pub end: usize,
    /// The BWT interval queried for `[begin, end)`; `(0, 0)` for gap
    /// regions, which are never queried.
    pub interval: (usize, usize),
    pub kind: RegionKind,
    /// 0 = ignore, 1 = exact, 2 = at most 1 error, 3 = at most 2 errors.
    pub degree: u8,
}

impl Region {
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.end - self.begin
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.begin == self.end
    }
}

/// Tunable knobs for one adaptive region-profile model
/// (`rp_minimal`/`rp_boost`/`rp_delimit`, spec.md §6, §9).
#[derive(Clone, Copy, Debug)]
pub struct RegionProfileModel {
    pub region_th: usize,
    pub max_steps: usize,
    pub dec_factor: f64,
    pub region_type_th: usize,
}

impl RegionProfileModel {
    /// Tight stop condition, few steps: prioritizes speed.
    #[must_use]
    pub fn minimal() -> Self {
        Self {
            region_th: 1,
            max_steps: 4,
            dec_factor: 2.0,
            region_type_th: 4,
        }
    }

    /// Gives regions more room to keep extending before giving up on
    /// improvement, at the cost of more backward-search steps.
    ///
    /// Kept numerically distinct from [`RegionProfileModel::delimit`] on
    /// purpose — nothing in this crate aliases the two models.
    #[must_use]
    pub fn boost() -> Self {
        Self {
            region_th: 1,
            max_steps: 6,
            dec_factor: 3.0,
            region_type_th: 6,
        }
    }

    #[must_use]
    pub fn delimit() -> Self {
        Self {
            region_th: 1,
            max_steps: 10,
            dec_factor: 5.0,
            region_type_th: 10,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct RegionProfile {
    pub regions: Vec<Region>,
}

/// Builds an adaptive region profile by walking `key` right to left,
/// extending a BWT interval per region and closing it once it is either
/// selective enough, has stalled, or the key is exhausted (spec.md §4.C).
#[must_use]
pub fn build_adaptive(index: &Index, key: &[u8], model: RegionProfileModel) -> RegionProfile {
    let mut regions = Vec::new();
    let n = key.len();
    let mut i = n;

    while i > 0 {
        if !Base::from_code(key[i - 1]).is_canonical() {
            let end = i;
            let mut begin = i - 1;
            while begin > 0 && !Base::from_code(key[begin - 1]).is_canonical() {
                begin -= 1;
            }
            regions.push(Region {
                begin,
                end,
                interval: (0, 0),
                kind: RegionKind::Gap,
                degree: 0,
            });
            i = begin;
            continue;
        }

        let end = i;
        let mut begin = i;
        let mut interval = (0, index.bwt_len());
        let mut best = index.bwt_len();
        let mut steps_since_improve = 0usize;

        loop {
            if begin == 0 {
                break;
            }
            let c = Base::from_code(key[begin - 1]);
            if !c.is_canonical() {
                break;
            }
            let candidate = index.interval_extend(interval, c);
            if candidate.0 >= candidate.1 {
                break;
            }
            interval = candidate;
            begin -= 1;

            let width = interval.1 - interval.0;
            if (width as f64) * model.dec_factor <= best as f64 {
                best = width;
                steps_since_improve = 0;
            } else {
                steps_since_improve += 1;
            }

            if width <= model.region_th || steps_since_improve >= model.max_steps {
                break;
            }
        }

        let width = interval.1 - interval.0;
        let kind = if width <= model.region_type_th { RegionKind::Unique } else { RegionKind::Standard };
        regions.push(Region {
            begin,
            end,
            interval,
            kind,
            degree: 0,
        });
        i = begin;
    }

    regions.reverse();
    RegionProfile { regions }
}

/// Builds a deterministic, fixed-length partition (spec.md §4.C "fixed
/// generation"), used when the search must be reproducible across
/// implementations (e.g. GPU offload).
#[must_use]
pub fn build_fixed(index: &Index, key: &[u8], region_length: usize, region_type_th: usize) -> RegionProfile {
    let mut regions = Vec::new();
    let n = key.len();
    let mut begin = 0;
    while begin < n {
        let end = (begin + region_length).min(n);
        let end = if n - end < region_length { n } else { end };

        let slice = &key[begin..end];
        if slice.iter().all(|&c| Base::from_code(c).is_canonical()) {
            let interval = index.interval_search_codes(slice).unwrap_or((0, 0));
            let width = interval.1.saturating_sub(interval.0);
            let kind = if width > 0 && width <= region_type_th { RegionKind::Unique } else { RegionKind::Standard };
            regions.push(Region {
                begin,
                end,
                interval,
                kind,
                degree: 0,
            });
        } else {
            regions.push(Region {
                begin,
                end,
                interval: (0, 0),
                kind: RegionKind::Gap,
                degree: 0,
            });
        }
        begin = end;
    }
    RegionProfile { regions }
}

/// Inserts explicit gap regions for any uncovered span of `[0, key_len)`.
pub fn fill_gaps(profile: &mut RegionProfile, key_len: usize) {
    let mut filled = Vec::with_capacity(profile.regions.len());
    let mut cursor = 0;
    for region in &profile.regions {
        if region.begin > cursor {
            filled.push(Region {
                begin: cursor,
                end: region.begin,
                interval: (0, 0),
                kind: RegionKind::Gap,
                degree: 0,
            });
        }
        filled.push(*region);
        cursor = region.end.max(cursor);
    }
    if cursor < key_len {
        filled.push(Region {
            begin: cursor,
            end: key_len,
            interval: (0, 0),
            kind: RegionKind::Gap,
            degree: 0,
        });
    }
    profile.regions = filled;
}

/// Fuses non-gap regions shorter than `proper_length` into an adjacent
/// region, using only region metadata (spec.md §4.C: "no extra index
/// queries"). The merged region keeps the wider neighbor's interval, which
/// is only ever used afterward to gauge mappability, not to decode exact
/// positions for the shorter half.
pub fn merge_small_regions(profile: &mut RegionProfile, proper_length: usize) {
    if profile.regions.is_empty() {
        return;
    }
    let mut merged: Vec<Region> = Vec::with_capacity(profile.regions.len());
    for region in &profile.regions {
        let should_merge = region.kind != RegionKind::Gap && region.len() < proper_length;
        match merged.last_mut() {
            Some(prev) if should_merge && prev.kind != RegionKind::Gap => {
                if prev.len() >= region.len() {
                    prev.end = region.end;
                } else {
                    prev.begin = prev.begin.min(region.begin);
                    prev.end = region.end;
                    prev.interval = region.interval;
                    prev.kind = region.kind;
                }
            }
            _ => merged.push(*region),
        }
    }
    profile.regions = merged;
}

/// Assigns filtering degree 1 (exact) to every non-gap region: the "fast
/// mode" static schedule.
pub fn schedule_static(profile: &mut RegionProfile) {
    for region in &mut profile.regions {
        region.degree = if region.kind == RegionKind::Gap { 0 } else { 1 };
    }
}

/// Orders non-gap regions by selectivity (narrowest interval first, i.e.
/// most mappable) and spends the remaining error budget on the regions
/// long enough to be worth a neighborhood search (spec.md §4.C).
pub fn schedule_dynamic(profile: &mut RegionProfile, mut errors_allowed: usize, proper_length: usize, filtering_region_factor: f64) {
    let sensibility_length = (filtering_region_factor * proper_length as f64).ceil() as usize;

    let mut order: Vec<usize> = (0..profile.regions.len()).filter(|&i| profile.regions[i].kind != RegionKind::Gap).collect();
    order.sort_by_key(|&i| profile.regions[i].interval.1 - profile.regions[i].interval.0);

    for idx in order {
        let region = &mut profile.regions[idx];
        if region.len() < sensibility_length || errors_allowed == 0 {
            region.degree = 1;
            continue;
        }
        region.degree = if errors_allowed >= 2 { 3 } else { 2 };
        errors_allowed -= 1;
    }

    for region in &mut profile.regions {
        if region.kind == RegionKind::Gap {
            region.degree = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::builder::build_index;
    use crate::io::fastx::FastX;

    fn toy_index() -> Index {
        let records = vec![FastX {
            header:   "chr1".into(),
            sequence: b"ACGTACGTACGTACGTACGTTTGGCCAATTGGCC".to_vec(),
            quality:  None,
        }];
        build_index(&records, false)
    }

    fn encode(s: &[u8]) -> Vec<u8> {
        s.iter().map(|&b| Base::from_ascii(b) as u8).collect()
    }

    #[test]
    fn adaptive_profile_covers_whole_key_without_overlap() {
        let index = toy_index();
        let key = encode(b"ACGTTTGGCCAATTGGCC");
        let profile = build_adaptive(&index, &key, RegionProfileModel::minimal());

        let mut cursor = 0;
        for region in &profile.regions {
            assert!(region.begin >= cursor);
            assert!(region.begin < region.end || region.is_empty());
            cursor = region.end;
        }
        assert_eq!(cursor, key.len());
    }

    #[test]
    fn wildcard_run_becomes_a_single_gap_region() {
        let index = toy_index();
        let key = encode(b"ACGTNNNACGT");
        let profile = build_adaptive(&index, &key, RegionProfileModel::minimal());
        let gap = profile.regions.iter().find(|r| r.kind == RegionKind::Gap).expect("expected a gap region");
        assert_eq!(gap.begin, 4);
        assert_eq!(gap.end, 7);
    }

    #[test]
    fn fixed_profile_has_identical_length_windows() {
        let index = toy_index();
        let key = encode(b"ACGTACGTACGTACGT");
        let profile = build_fixed(&index, &key, 4, 4);
        assert_eq!(profile.regions.len(), 4);
        for region in &profile.regions[..3] {
            assert_eq!(region.len(), 4);
        }
    }

    #[test]
    fn static_schedule_assigns_exact_degree_to_every_region() {
        let index = toy_index();
        let key = encode(b"ACGTACGTACGTACGT");
        let mut profile = build_fixed(&index, &key, 4, 4);
        schedule_static(&mut profile);
        assert!(profile.regions.iter().all(|r| r.degree == 1));
    }

    #[test]
    fn fill_gaps_covers_every_hole() {
        let mut profile = RegionProfile {
            regions: vec![Region {
                begin: 2,
                end: 5,
                interval: (0, 1),
                kind: RegionKind::Unique,
                degree: 1,
            }],
        };
        fill_gaps(&mut profile, 8);
        assert_eq!(profile.regions[0].begin, 0);
        assert_eq!(profile.regions[0].end, 2);
        assert_eq!(profile.regions.last().unwrap().end, 8);
    }
}
