use super::*;
use crate::mask::region::FaceRegion;

fn face(x: f32) -> RegionFrame {
    RegionFrame::new(64, 48, vec![FaceRegion::new(x, 2.0, 10.0, 12.0, 0.8)])
}

#[test]
fn lookup_distinguishes_missing_and_empty_frames() {
    let mut t = RegionTrack::new();
    t.insert(FrameIndex(2), face(1.0));
    t.insert(FrameIndex(5), RegionFrame::new(64, 48, vec![]));
    assert_eq!(t.len(), 2);
    assert!(matches!(t.mask_for(FrameIndex(2)), FrameMask::Regions(_)));
    assert!(matches!(t.mask_for(FrameIndex(5)), FrameMask::Regions(f) if f.regions.is_empty()));
    assert!(matches!(t.mask_for(FrameIndex(3)), FrameMask::None));
}

#[test]
fn iter_is_in_index_order() {
    let mut t = RegionTrack::new();
    t.insert(FrameIndex(9), face(1.0));
    t.insert(FrameIndex(1), face(2.0));
    t.insert(FrameIndex(4), face(3.0));
    let order: Vec<u64> = t.iter().map(|(i, _)| i.0).collect();
    assert_eq!(order, vec![1, 4, 9]);
}

#[test]
fn merge_prefers_incoming_frames() {
    let mut a = RegionTrack::new();
    a.insert(FrameIndex(0), face(1.0));
    a.insert(FrameIndex(1), face(1.0));
    let mut b = RegionTrack::new();
    b.insert(FrameIndex(1), face(7.0));
    b.insert(FrameIndex(2), face(7.0));
    a.merge(b);
    assert_eq!(a.len(), 3);
    assert_eq!(a.get(FrameIndex(1)).unwrap().regions[0].x, 7.0);
    assert_eq!(a.remove(FrameIndex(0)), Some(face(1.0)));
    assert!(a.get(FrameIndex(0)).is_none());
}

#[test]
fn json_file_layout_is_stable() {
    let dir = std::env::temp_dir().join(format!(
        "veilcut_track_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("track.json");

    let mut t = RegionTrack::new();
    t.insert(FrameIndex(12), face(3.0).with_min_confidence(0.5));
    t.to_path(&path).unwrap();

    let raw: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(raw["frames"]["12"]["frame_width"], 64);
    assert_eq!(raw["frames"]["12"]["min_confidence"], 0.5);

    assert_eq!(RegionTrack::from_path(&path).unwrap(), t);

    std::fs::write(&path, "{\"frames\": 3}").unwrap();
    assert!(matches!(
        RegionTrack::from_path(&path),
        Err(VeilcutError::Serde(_))
    ));
    std::fs::remove_dir_all(&dir).ok();
}
