use std::io::Cursor;

use super::*;
use crate::assets::decode::PreparedImage;
use crate::batch::package::{InMemoryPackager, PackageEntry};
use crate::compose::compositor::CompositorOpts;
use crate::settings::model::{Anchor, ContentKind};

fn base(name: &str, w: u32, h: u32) -> ImageFile {
    ImageFile::from_decoded(name, PreparedImage::solid(w, h, [255, 255, 255, 255]))
}

fn mark() -> ImageFile {
    ImageFile::from_decoded("mark.png", PreparedImage::solid(2, 2, [0, 0, 255, 255]))
}

fn settings() -> WatermarkSettings {
    WatermarkSettings {
        content_kind: ContentKind::Image,
        size: 20.0,
        opacity: 100.0,
        position: Anchor::MiddleCenter,
        ..Default::default()
    }
}

fn broken(name: &str) -> ImageFile {
    let img = image::RgbaImage::from_pixel(4, 4, image::Rgba([1, 2, 3, 255]));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Bmp)
        .unwrap();
    let data_offset = u32::from_le_bytes([buf[10], buf[11], buf[12], buf[13]]) as usize;
    buf.truncate(data_offset);
    ImageFile::from_bytes(name, buf).unwrap()
}

#[derive(Default)]
struct Sessions {
    counts: Vec<usize>,
    fail: bool,
}

impl SessionLog for Sessions {
    fn record_session(
        &mut self,
        image_count: usize,
        _settings: &WatermarkSettings,
    ) -> FiligraneResult<()> {
        if self.fail {
            return Err(FiligraneError::validation("storage full"));
        }
        self.counts.push(image_count);
        Ok(())
    }
}

struct RefusingPackager;

impl Packager for RefusingPackager {
    fn package(&mut self, _entries: &[PackageEntry<'_>]) -> FiligraneResult<PackageReceipt> {
        Err(FiligraneError::packaging("disk full"))
    }
}

#[test]
fn outputs_match_input_count_and_order_across_resolutions() {
    let mut compositor = Compositor::new(CompositorOpts::default());
    let bases = vec![
        base("a.jpg", 40, 30),
        base("b.png", 17, 64),
        base("c.webp", 120, 12),
    ];
    let wm = mark();
    let mut seen = Vec::new();
    let out = {
        let mut driver = BatchDriver::new()
            .with_seed(9)
            .on_progress(|p| seen.push((p.processed, p.total, p.ok)));
        driver
            .render_all(&mut compositor, &bases, &settings(), Some(&wm))
            .unwrap()
    };

    assert!(out.is_complete());
    assert_eq!(out.seed_policy, SeedPolicy::Fixed(9));
    assert!(out.outputs.iter().all(|o| o.seed == 9));
    let names: Vec<&str> = out.outputs.iter().map(|o| o.source_name.as_str()).collect();
    assert_eq!(names, vec!["a.jpg", "b.png", "c.webp"]);
    let dims: Vec<(u32, u32)> = out.outputs.iter().map(|o| (o.width, o.height)).collect();
    assert_eq!(dims, vec![(40, 30), (17, 64), (120, 12)]);
    assert_eq!(seen, vec![(1, 3, true), (2, 3, true), (3, 3, true)]);
}

#[test]
fn per_render_policy_draws_a_seed_for_each_image() {
    let mut compositor = Compositor::default();
    let bases = vec![base("a.png", 10, 10), base("b.png", 10, 10), base("c.png", 10, 10)];
    let wm = mark();
    let out = BatchDriver::new()
        .with_seed_policy(SeedPolicy::PerRender)
        .render_all(&mut compositor, &bases, &settings(), Some(&wm))
        .unwrap();

    assert!(out.is_complete());
    assert_eq!(out.seed_policy, SeedPolicy::PerRender);
    let mut seeds: Vec<u64> = out.outputs.iter().map(|o| o.seed).collect();
    seeds.dedup();
    assert_eq!(seeds.len(), 3, "{seeds:?}");
}

#[test]
fn failed_image_is_reported_and_others_continue() {
    let mut compositor = Compositor::default();
    let bases = vec![base("a.png", 20, 20), broken("bad.bmp"), base("c.png", 20, 20)];
    let wm = mark();
    let out = BatchDriver::new()
        .render_all(&mut compositor, &bases, &settings(), Some(&wm))
        .unwrap();

    assert_eq!(out.outputs.len(), 2);
    assert_eq!(out.failures.len(), 1);
    let failure = &out.failures[0];
    assert_eq!((failure.index, failure.name.as_str()), (1, "bad.bmp"));
    assert_eq!(failure.step, FailureStep::Decode);
    assert!(!out.is_complete());

    let mut sink = InMemoryPackager::new();
    let err = out.package(&mut sink).unwrap_err();
    assert!(matches!(err, FiligraneError::Packaging(_)));
    assert!(sink.entries().is_empty());
}

#[test]
fn missing_surface_aborts_the_batch() {
    let mut compositor = Compositor::default();
    let bases = vec![base("a.png", 10, 10), base("huge.png", 70_000, 1)];
    let wm = mark();
    let err = BatchDriver::new()
        .render_all(&mut compositor, &bases, &settings(), Some(&wm))
        .unwrap_err();
    assert!(matches!(err, FiligraneError::SurfaceUnavailable(_)));
}

#[test]
fn cancel_stops_before_the_next_image() {
    let mut compositor = Compositor::default();
    let bases = vec![base("a.png", 10, 10), base("b.png", 10, 10), base("c.png", 10, 10)];
    let wm = mark();
    let flag = CancelFlag::new();
    let trigger = flag.clone();
    let out = BatchDriver::new()
        .with_cancel(flag)
        .on_progress(move |p| {
            if p.processed == 1 {
                trigger.cancel();
            }
        })
        .render_all(&mut compositor, &bases, &settings(), Some(&wm))
        .unwrap();

    assert!(out.canceled);
    assert_eq!(out.outputs.len(), 1);
    assert!(out.failures.is_empty());
    assert!(!out.is_complete());
}

#[test]
fn invalid_settings_fail_before_any_image() {
    let mut compositor = Compositor::default();
    let bases = vec![base("a.png", 10, 10)];
    let s = WatermarkSettings {
        content_kind: ContentKind::Image,
        ..Default::default()
    };
    let err = BatchDriver::new()
        .render_all(&mut compositor, &bases, &s, None)
        .unwrap_err();
    assert!(matches!(err, FiligraneError::Validation(_)));
}

#[test]
fn run_packages_then_records_one_session() {
    let mut compositor = Compositor::default();
    let bases = vec![base("a.png", 10, 10), base("a.jpg", 12, 8)];
    let wm = mark();
    let mut sink = InMemoryPackager::new();
    let mut sessions = Sessions::default();
    let report = BatchDriver::new()
        .run(
            &mut compositor,
            &bases,
            &settings(),
            Some(&wm),
            &mut sink,
            Some(&mut sessions),
        )
        .unwrap();

    assert!(matches!(report.packaging, PackageOutcome::Packaged(ref r) if r.entries == 2));
    assert!(report.session_recorded);
    assert_eq!(sessions.counts, vec![2]);
    let names: Vec<&str> = sink.entries().iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["watermarked_a.png", "watermarked_a_2.png"]);
}

#[test]
fn incomplete_run_is_neither_packaged_nor_recorded() {
    let mut compositor = Compositor::default();
    let bases = vec![broken("bad.bmp")];
    let wm = mark();
    let mut sink = InMemoryPackager::new();
    let mut sessions = Sessions::default();
    let report = BatchDriver::new()
        .run(
            &mut compositor,
            &bases,
            &settings(),
            Some(&wm),
            &mut sink,
            Some(&mut sessions),
        )
        .unwrap();
    assert!(matches!(report.packaging, PackageOutcome::Skipped));
    assert!(!report.session_recorded);
    assert!(sessions.counts.is_empty());
}

#[test]
fn packaging_failure_keeps_outputs_for_retry() {
    let mut compositor = Compositor::default();
    let bases = vec![base("a.png", 10, 10)];
    let wm = mark();
    let mut sessions = Sessions::default();
    let report = BatchDriver::new()
        .run(
            &mut compositor,
            &bases,
            &settings(),
            Some(&wm),
            &mut RefusingPackager,
            Some(&mut sessions),
        )
        .unwrap();
    assert!(matches!(report.packaging, PackageOutcome::Failed(FiligraneError::Packaging(_))));
    assert!(!report.session_recorded);

    let mut sink = InMemoryPackager::new();
    let receipt = report.output.package(&mut sink).unwrap();
    assert_eq!(receipt.entries, 1);
}

#[test]
fn session_log_failure_does_not_fail_the_batch() {
    let mut compositor = Compositor::default();
    let bases = vec![base("a.png", 10, 10)];
    let wm = mark();
    let mut sink = InMemoryPackager::new();
    let mut sessions = Sessions {
        fail: true,
        ..Default::default()
    };
    let report = BatchDriver::new()
        .run(
            &mut compositor,
            &bases,
            &settings(),
            Some(&wm),
            &mut sink,
            Some(&mut sessions),
        )
        .unwrap();
    assert!(matches!(report.packaging, PackageOutcome::Packaged(_)));
    assert!(!report.session_recorded);
}
