//! Cursor pick resolution.
//!
//! During a pick cycle every drawn object gets the next free color index in
//! the red channel (first object = 1); after the cycle an 8×8 pixel window
//! around the cursor is read back and scanned. The reported hit is the last
//! appended entry whose index appears in the window, and its C_AGGR/C_ASSO
//! relations (carried in `_LNAM_REFS_GEO`) ride along for highlighting.

use smallvec::SmallVec;

use crate::geo::FeatureId;
use crate::plib::S52Object;

use super::types::{PickEntry, PickState};

/// Side of the readback window, pixels.
pub const PICK_WINDOW: u32 = 8;

/// 8-bit red channel, index 0 reserved for the background.
pub const PICK_MAX_OBJECTS: u32 = 255;

/// Related feature ids from the `_LNAM_REFS_GEO` attribute (comma or space
/// separated).
pub(crate) fn related_ids(obj: &S52Object) -> SmallVec<[FeatureId; 2]> {
    let mut out = SmallVec::new();
    if let Some(refs) = obj.feature.attribute("_LNAM_REFS_GEO") {
        for tok in refs.split([',', ' ']) {
            if let Ok(id) = tok.trim().parse::<u32>() {
                out.push(FeatureId(id));
            }
        }
    }
    out
}

/// Allocate the next color index and append the object to the pick list.
/// `None` once the 8-bit index space is exhausted.
pub(crate) fn assign_index(state: &mut PickState, obj: &S52Object) -> Option<[f32; 4]> {
    if state.next_index >= PICK_MAX_OBJECTS {
        return None;
    }
    state.next_index += 1;
    let index = state.next_index;
    state.entries.push(PickEntry {
        index,
        id: obj.feature.id(),
        name: obj.feature.name().to_owned(),
        summary: obj.feature.attribute_summary(),
        related: related_ids(obj),
    });
    Some([index as f32 / 255.0, 0.0, 0.0, 1.0])
}

/// Scan the readback window and settle the winner: the last appended entry
/// whose index shows up (top-of-list by iteration order, as the legacy
/// pipeline reported it).
pub(crate) fn resolve(state: &mut PickState, rgba: &[u8]) {
    state.result = None;
    state.result_summary = None;
    state.picked.clear();

    let mut winner: Option<&PickEntry> = None;
    for entry in &state.entries {
        let hit = rgba
            .chunks_exact(4)
            .any(|px| px[0] as u32 == entry.index && entry.index > 0);
        if hit {
            winner = Some(entry);
        }
    }
    if let Some(entry) = winner {
        let mut s = format!("{}:{}", entry.name, entry.id);
        if !entry.related.is_empty() {
            s.push(':');
            let rel: Vec<String> = entry.related.iter().map(|r| r.to_string()).collect();
            s.push_str(&rel.join(","));
        }
        state.result = Some(s);
        state.result_summary = Some(entry.summary.clone());
        state.picked.push(entry.id);
        state.picked.extend(entry.related.iter().copied());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Feature;

    fn obj(name: &str, refs: Option<&str>) -> S52Object {
        let mut f = Feature::point([0.0; 3]);
        f.set_name(name);
        if let Some(r) = refs {
            f.set_attribute("_LNAM_REFS_GEO", r);
        }
        S52Object::new(f)
    }

    #[test]
    fn indices_are_distinct_and_start_at_one() {
        let mut state = PickState::default();
        let a = obj("BOYLAT", None);
        let b = obj("LIGHTS", None);
        let ca = assign_index(&mut state, &a).unwrap();
        let cb = assign_index(&mut state, &b).unwrap();
        assert_eq!(state.entries[0].index, 1);
        assert_eq!(state.entries[1].index, 2);
        assert_ne!(ca, cb);
    }

    #[test]
    fn index_space_is_bounded() {
        let mut state = PickState::default();
        let o = obj("DEPARE", None);
        for _ in 0..PICK_MAX_OBJECTS {
            assert!(assign_index(&mut state, &o).is_some());
        }
        assert!(assign_index(&mut state, &o).is_none());
    }

    #[test]
    fn last_matching_entry_wins() {
        let mut state = PickState::default();
        let a = obj("DEPARE", None);
        let b = obj("BOYLAT", None);
        assign_index(&mut state, &a);
        assign_index(&mut state, &b);
        // both indices present in the window: 1 and 2
        let mut rgba = vec![0u8; 64 * 4];
        rgba[0] = 1;
        rgba[4] = 2;
        resolve(&mut state, &rgba);
        let result = state.result.clone().unwrap();
        assert!(result.starts_with("BOYLAT:"));
    }

    #[test]
    fn relations_ride_along_and_highlight() {
        let mut state = PickState::default();
        let light = obj("LIGHTS", None);
        let light_id = light.feature.id();
        let buoy = obj("BOYLAT", Some(&light_id.to_string()));
        let buoy_id = buoy.feature.id();
        assign_index(&mut state, &buoy);
        let mut rgba = vec![0u8; 64 * 4];
        rgba[0] = 1;
        resolve(&mut state, &rgba);
        let result = state.result.clone().unwrap();
        assert_eq!(result, format!("BOYLAT:{buoy_id}:{light_id}"));
        assert_eq!(state.picked, vec![buoy_id, light_id]);
    }

    #[test]
    fn empty_window_picks_nothing() {
        let mut state = PickState::default();
        assign_index(&mut state, &obj("BOYLAT", None));
        let rgba = vec![0u8; 64 * 4];
        resolve(&mut state, &rgba);
        assert!(state.result.is_none());
        assert!(state.picked.is_empty());
    }
}
