// tests/render_pipeline.rs
use glam::Vec2;
use image::Rgb;
use symbios_sketch::{
    CanvasTransform, Grammar, GrammarConfig, LsysError, MAX_CANVAS_SIDE, MAX_LINE_WIDTH,
    ProductionRule, Rasterizer, RenderConfig, RuleConfig, RuleSet, Segment, SketchConfig,
    TurtleState, WeightedSuccessor, Word, draw, render,
};
use tempfile::TempDir;

const BACKGROUND: Rgb<u8> = Rgb([233, 234, 239]);
const INK: Rgb<u8> = Rgb([75, 106, 136]);

fn pixel_canvas() -> Rasterizer {
    Rasterizer::new(400, 400, BACKGROUND).with_transform(CanvasTransform::identity())
}

fn seg(from: (f32, f32), to: (f32, f32), drawn: bool) -> Segment {
    Segment {
        from: Vec2::new(from.0, from.1),
        to: Vec2::new(to.0, to.1),
        drawn,
    }
}

fn plant() -> Grammar {
    let rules = RuleSet::from_rules([ProductionRule::new("F", "F[+F]F[-F]F")]).unwrap();
    Grammar::inferred(Word::from("F"), rules)
}

#[test]
fn test_line_endpoints_take_color() {
    let mut raster = pixel_canvas();
    raster.draw_segment(&seg((200.0, 200.0), (133.0, 133.0), true), INK, 1);

    assert_eq!(raster.pixel(200, 200), Some(INK));
    assert_eq!(raster.pixel(133, 133), Some(INK));
    assert_eq!(raster.pixel(166, 166), Some(INK));
    assert_eq!(raster.pixel(0, 0), Some(BACKGROUND));
    assert_eq!(raster.pixel(200, 133), Some(BACKGROUND));
}

#[test]
fn test_pen_up_segment_not_drawn() {
    let mut raster = pixel_canvas();
    raster.draw_segment(&seg((10.0, 10.0), (50.0, 10.0), false), INK, 1);
    assert!(raster.canvas().pixels().all(|p| *p == BACKGROUND));
}

#[test]
fn test_out_of_bounds_is_clipped() {
    let mut raster = pixel_canvas();
    // Entirely outside: nothing drawn, no panic.
    raster.draw_segment(&seg((-500.0, -500.0), (-10.0, 1e9), true), INK, 3);
    assert!(raster.canvas().pixels().all(|p| *p == BACKGROUND));

    // Crossing the canvas: the visible part is painted edge to edge.
    raster.draw_segment(&seg((-1e6, 50.0), (1e6, 50.0), true), INK, 1);
    assert_eq!(raster.pixel(0, 50), Some(INK));
    assert_eq!(raster.pixel(399, 50), Some(INK));
    assert_eq!(raster.pixel(200, 51), Some(BACKGROUND));
}

#[test]
fn test_line_width_stamps_square_brush() {
    let mut raster = pixel_canvas();
    raster.draw_segment(&seg((100.0, 100.0), (100.0, 100.0), true), INK, 3);
    for y in 99..=101 {
        for x in 99..=101 {
            assert_eq!(raster.pixel(x, y), Some(INK), "({x}, {y})");
        }
    }
    assert_eq!(raster.pixel(102, 100), Some(BACKGROUND));
    assert_eq!(raster.pixel(98, 100), Some(BACKGROUND));
}

#[test]
fn test_later_segments_overpaint() {
    let red = Rgb([255, 0, 0]);
    let mut raster = pixel_canvas();
    raster.draw_segment(&seg((0.0, 10.0), (20.0, 10.0), true), INK, 1);
    raster.draw_segment(&seg((10.0, 0.0), (10.0, 20.0), true), red, 1);
    assert_eq!(raster.pixel(10, 10), Some(red));
    assert_eq!(raster.pixel(5, 10), Some(INK));
}

#[test]
fn test_centered_transform_flips_y() {
    let t = CanvasTransform::centered(400, 300);
    assert_eq!(t.apply(Vec2::ZERO), Vec2::new(200.0, 150.0));
    assert_eq!(t.apply(Vec2::new(10.0, 10.0)), Vec2::new(210.0, 140.0));

    let mut raster = Rasterizer::new(400, 300, BACKGROUND);
    raster.draw_segment(&seg((0.0, 0.0), (0.0, 20.0), true), INK, 1);
    assert_eq!(raster.pixel(200, 130), Some(INK));
    assert_eq!(raster.pixel(200, 170), Some(BACKGROUND));
}

#[test]
fn test_fit_transform_keeps_drawing_inside() {
    let bounds = (Vec2::new(-50.0, 0.0), Vec2::new(150.0, 100.0));
    // Pixels 0..=220, so 200 pixels of room between the margins.
    let t = CanvasTransform::fit(bounds, 221, 221, 10.0);
    assert!((t.scale - 1.0).abs() < 1e-5);

    let lo = t.apply(bounds.0);
    let hi = t.apply(bounds.1);
    assert!(lo.abs_diff_eq(Vec2::new(10.0, 160.0), 1e-3), "{lo}");
    assert!(hi.abs_diff_eq(Vec2::new(210.0, 60.0), 1e-3), "{hi}");
}

#[test]
fn test_fit_without_margin_reaches_both_edges() {
    let bounds = (Vec2::new(0.0, 0.0), Vec2::new(100.0, 100.0));
    let t = CanvasTransform::fit(bounds, 101, 101, 0.0);
    assert!(t.apply(Vec2::new(100.0, 0.0)).abs_diff_eq(Vec2::new(100.0, 100.0), 1e-4));
    assert!(t.apply(Vec2::new(0.0, 100.0)).abs_diff_eq(Vec2::new(0.0, 0.0), 1e-4));

    let mut raster = Rasterizer::new(101, 101, BACKGROUND).with_transform(t);
    raster.draw_segment(&seg((0.0, 0.0), (100.0, 0.0), true), INK, 1);
    raster.draw_segment(&seg((0.0, 100.0), (100.0, 100.0), true), INK, 1);

    for row in [0, 100] {
        let painted = (0..101).filter(|&x| raster.pixel(x, row) == Some(INK)).count();
        assert_eq!(painted, 101, "row {row}");
    }
    assert_eq!(raster.pixel(50, 50), Some(BACKGROUND));
}

#[test]
fn test_huge_brush_is_bounded_by_canvas() {
    let mut raster = Rasterizer::new(10, 10, BACKGROUND).with_transform(CanvasTransform::identity());
    raster.draw_line(Vec2::new(5.0, 5.0), Vec2::new(5.0, 5.0), INK, u32::MAX);
    assert!(raster.canvas().pixels().all(|p| *p == INK));
}

#[test]
fn test_persist_writes_and_overwrites() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("line.png");
    std::fs::write(&path, b"not an image").unwrap();

    let mut raster = pixel_canvas();
    raster.draw_segment(&seg((20.0, 20.0), (60.0, 20.0), true), INK, 1);
    raster.persist(&path).unwrap();

    let saved = image::open(&path).unwrap().to_rgb8();
    assert_eq!(saved.dimensions(), (400, 400));
    assert_eq!(*saved.get_pixel(20, 20), INK);
    assert_eq!(*saved.get_pixel(60, 20), INK);
    assert_eq!(*saved.get_pixel(300, 300), BACKGROUND);
}

#[test]
fn test_persist_to_missing_directory_fails() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("missing").join("out.png");
    match pixel_canvas().persist(&path) {
        Err(LsysError::Io { path: reported, .. }) => assert_eq!(reported, path),
        other => panic!("expected Io error, got {other:?}"),
    }
}

#[test]
fn test_draw_plant_pipeline() {
    let config = RenderConfig {
        depth: 3,
        turn_angle: 25.7,
        start: TurtleState::new(Vec2::ZERO, 90.0),
        width: 256,
        height: 256,
        ..Default::default()
    };
    let rendering = draw(&plant(), &config).unwrap();
    let report = &rendering.report;

    // Each generation multiplies the `F` count by five.
    assert_eq!(report.segments, 125);
    assert_eq!(report.drawn, 125);
    assert!(report.is_balanced());

    let ink = Rgb(config.line_color);
    let painted = rendering.raster.canvas().pixels().filter(|p| **p == ink).count();
    assert!(painted > 0);
}

#[test]
fn test_render_reports_unbalanced_word() {
    let grammar = Grammar::inferred(Word::from("F]F[F"), RuleSet::new());
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.png");

    let report = render(&grammar, &RenderConfig::default(), &path).unwrap();
    assert_eq!(report.segments, 3);
    assert_eq!(report.unmatched_pops, vec![1]);
    assert_eq!(report.open_branches, 1);
    assert!(!report.is_balanced());
    assert!(path.exists());
}

#[test]
fn test_invalid_render_config() {
    let config = RenderConfig {
        width: 0,
        ..Default::default()
    };
    assert!(matches!(
        draw(&plant(), &config),
        Err(LsysError::InvalidParameter(_))
    ));

    let config = RenderConfig {
        step_length: -2.0,
        ..Default::default()
    };
    assert!(matches!(
        draw(&plant(), &config),
        Err(LsysError::InvalidParameter(_))
    ));
}

#[test]
fn test_oversized_render_config_rejected() {
    let too_wide = RenderConfig {
        width: 100_000,
        ..Default::default()
    };
    assert!(matches!(
        too_wide.validate(),
        Err(LsysError::InvalidParameter(_))
    ));

    let fat_brush = RenderConfig {
        line_width: u32::MAX,
        ..Default::default()
    };
    assert!(matches!(
        draw(&plant(), &fat_brush),
        Err(LsysError::InvalidParameter(_))
    ));

    let at_limits = RenderConfig {
        width: MAX_CANVAS_SIDE,
        height: MAX_CANVAS_SIDE,
        line_width: MAX_LINE_WIDTH,
        ..Default::default()
    };
    assert!(at_limits.validate().is_ok());
}

#[test]
fn test_sketch_config_from_json() {
    let json = r#"{
        "grammar": {
            "alphabet": ["F", "f", "+", "-"],
            "axiom": "F-F-F-F",
            "rules": [
                { "predecessor": "F", "successor": "F+f-FF+F+FF+Ff+FF-f+FF-F-FF-Ff-FFF" },
                { "predecessor": "f", "successor": "fffff" }
            ],
            "policy": "strict"
        },
        "render": {
            "depth": 2,
            "width": 320,
            "height": 320,
            "line_width": 2,
            "start": { "position": [0, 0], "heading": 180, "pen_down": true }
        }
    }"#;
    let sketch: SketchConfig = serde_json::from_str(json).unwrap();
    assert_eq!(sketch.render.turn_angle, 90.0);

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("islands.png");
    let report = sketch.render_to(&path).unwrap();

    assert!(report.is_balanced());
    // Pen-up `f` moves are emitted but not rasterized.
    assert!(report.segments > report.drawn);
    assert!(report.drawn > 0);
    let saved = image::open(&path).unwrap().to_rgb8();
    assert_eq!(saved.dimensions(), (320, 320));
}

#[test]
fn test_stochastic_rule_config() {
    let config = GrammarConfig {
        axiom: "F".into(),
        rules: vec![RuleConfig {
            predecessor: "F".into(),
            successors: vec![
                WeightedSuccessor {
                    word: "F[+F]F".into(),
                    weight: 2.0,
                },
                WeightedSuccessor {
                    word: "F[-F]F".into(),
                    weight: 1.0,
                },
            ],
            ..Default::default()
        }],
        ..Default::default()
    };
    let grammar = config.build().unwrap();
    assert!(grammar.is_stochastic());
    assert_eq!(
        grammar.derive_seeded(3, 5).unwrap(),
        grammar.derive_seeded(3, 5).unwrap()
    );
}

#[test]
fn test_rule_config_validation() {
    let both = GrammarConfig {
        axiom: "a".into(),
        rules: vec![RuleConfig {
            predecessor: "a".into(),
            successor: Some("b".into()),
            successors: vec![WeightedSuccessor {
                word: "c".into(),
                weight: 1.0,
            }],
        }],
        ..Default::default()
    };
    assert!(matches!(both.build(), Err(LsysError::InvalidRule { .. })));

    let neither = GrammarConfig {
        axiom: "a".into(),
        rules: vec![RuleConfig {
            predecessor: "a".into(),
            ..Default::default()
        }],
        ..Default::default()
    };
    assert!(matches!(neither.build(), Err(LsysError::InvalidRule { .. })));

    let long_predecessor = GrammarConfig {
        axiom: "a".into(),
        rules: vec![RuleConfig {
            predecessor: "ab".into(),
            successor: Some("b".into()),
            ..Default::default()
        }],
        ..Default::default()
    };
    assert!(matches!(
        long_predecessor.build(),
        Err(LsysError::InvalidRule { .. })
    ));
}
