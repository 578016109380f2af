//! Integration tests for the editing engine
//! Tests undo symmetry for every command, history linearity, gesture merging
//! and structural edits
//!
//! Every command is built against the engine's current document, executed
//! through the engine and undone again; the attached tree must come back
//! exactly as it was.

use edit_engine::scene_model::kurbo::{Affine, Point};
use edit_engine::scene_model::{
    affine_approx_eq, Color, CombineOp, Document, Format, FontWeight, Layer, LayerId, Paint, Scene, Stroke, Swatch,
    Transform,
};
use edit_engine::*;
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::sync::Once;

static LOGGING: Once = Once::new();

fn init_logging() {
    LOGGING.call_once(|| {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
        let _ = tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_test_writer())
            .with(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

/// Test harness owning an engine and a few named layers
struct Harness {
    engine: EditingEngine,
    root: LayerId,
    rect: LayerId,
    ellipse: LayerId,
    text: LayerId,
    group: LayerId,
    grouped: LayerId,
}

impl Harness {
    /// root
    /// ├── rect      translate(10, 0)
    /// ├── ellipse
    /// ├── text      "hello world"
    /// └── group     translate(5, 5)
    ///     └── grouped  translate(10, 10)
    fn new() -> Self {
        init_logging();
        let mut doc = Document::new();
        let root = doc.scene.root_id();
        let insert = |scene: &mut Scene, layer: Layer, parent| scene.insert_layer(layer, parent, None).unwrap();

        let rect = insert(
            &mut doc.scene,
            Layer::rectangle(0.0, 0.0, 20.0, 10.0).with_transform(Transform::from_translation(10.0, 0.0)),
            root,
        );
        let ellipse = insert(&mut doc.scene, Layer::ellipse(Point::new(5.0, 5.0), 5.0, 5.0), root);
        let text = insert(&mut doc.scene, Layer::text("hello world"), root);
        let group = insert(
            &mut doc.scene,
            Layer::group().with_transform(Transform::from_translation(5.0, 5.0)),
            root,
        );
        let grouped = insert(
            &mut doc.scene,
            Layer::rectangle(0.0, 0.0, 4.0, 4.0).with_transform(Transform::from_translation(10.0, 10.0)),
            group,
        );
        doc.add_swatch(Swatch::new("brand", Paint::solid(Color::BLUE))).unwrap();

        Self {
            engine: EditingEngine::with_document(doc),
            root,
            rect,
            ellipse,
            text,
            group,
            grouped,
        }
    }

    /// Build a command against the current scene
    fn build<C: Command>(&self, f: impl FnOnce(&Scene) -> Result<C>) -> Box<dyn Command> {
        Box::new(self.engine.read(|doc| f(&doc.scene)).unwrap().unwrap())
    }

    /// Everything a user can observe: attached layers and the swatch list
    fn snapshot(&self) -> serde_json::Value {
        self.engine
            .read(|doc| {
                let layers: BTreeMap<String, serde_json::Value> = doc
                    .scene
                    .descendants(doc.scene.root_id())
                    .into_iter()
                    .map(|id| {
                        let layer = doc.scene.get(id).unwrap();
                        (id.to_string(), serde_json::to_value(layer).unwrap())
                    })
                    .collect();
                serde_json::json!({
                    "layers": layers,
                    "swatches": doc.swatches(),
                })
            })
            .unwrap()
    }

    fn assert_symmetric(&mut self, command: Box<dyn Command>) {
        let description = command.description().to_string();
        let before = self.snapshot();

        self.engine.execute(command).unwrap();
        let after = self.snapshot();
        assert_ne!(before, after, "{} changed nothing", description);

        self.engine.undo().unwrap();
        assert_eq!(before, self.snapshot(), "undo of {} is not exact", description);

        self.engine.redo().unwrap();
        assert_eq!(after, self.snapshot(), "redo of {} differs from execute", description);

        self.engine.undo().unwrap();
        self.engine.read(|doc| doc.scene.validate().unwrap()).unwrap();
    }

    fn opacity(&self, id: LayerId) -> f32 {
        self.engine.read(|doc| doc.scene.get(id).unwrap().opacity()).unwrap()
    }

    fn absolute(&self, id: LayerId) -> Affine {
        self.engine.read(|doc| doc.scene.absolute_transform(id)).unwrap()
    }

    fn index_of(&self, id: LayerId) -> Option<usize> {
        self.engine.read(|doc| doc.scene.index_of(id)).unwrap()
    }
}

// =============================================================================
// Undo symmetry
// =============================================================================

#[test]
fn test_undo_symmetry_property_commands() {
    let mut h = Harness::new();
    let (rect, ellipse) = (h.rect, h.ellipse);

    let commands = vec![
        h.build(|s| TransformLayers::translate(s, vec![rect, ellipse], 3.0, -2.0)),
        h.build(|s| TransformLayers::rotate_about(s, vec![rect], 0.7, Point::new(10.0, 5.0))),
        h.build(|s| TransformLayers::scale_about(s, vec![ellipse], 2.0, 0.5, Point::new(5.0, 5.0))),
        h.build(|s| SetOpacity::new(s, vec![rect], 0.25)),
        h.build(|s| ChangeOpacity::new(s, vec![rect, ellipse], -0.4)),
        h.build(|s| SetVisibility::new(s, vec![ellipse], false)),
        h.build(|s| SetSelection::new(s, vec![rect], true)),
        h.build(|s| RenameLayers::new(s, vec![rect], Some("Card".to_string()))),
        h.build(|s| SetFill::new(s, vec![rect], Some(Paint::solid(Color::RED)))),
        h.build(|s| SetStroke::new(s, vec![ellipse], Some(Stroke::new(Paint::solid(Color::BLACK), 2.0)))),
        h.build(|s| SetClip::new(s, vec![rect], Some(ellipse))),
        h.build(|s| SetMask::new(s, vec![ellipse], Some(rect))),
    ];
    for command in commands {
        h.assert_symmetric(command);
    }
}

#[test]
fn test_undo_symmetry_structural_commands() {
    let mut h = Harness::new();
    let (root, rect, ellipse, group, grouped) = (h.root, h.rect, h.ellipse, h.group, h.grouped);

    let commands = vec![
        h.build(|s| AddLayer::new(s, Layer::rectangle(1.0, 1.0, 2.0, 2.0), root, Some(2))),
        h.build(|s| RemoveLayers::new(s, vec![ellipse, rect])),
        h.build(|s| ChangeZIndex::new(s, vec![rect], 2)),
        h.build(|s| ChangeZIndex::send_to_back(s, vec![rect, ellipse])),
        h.build(|s| GroupLayers::new(s, vec![ellipse, rect])),
        h.build(|s| UngroupLayers::new(s, vec![group])),
        h.build(|s| BinaryOperation::union(s, rect, ellipse)),
        h.build(|s| BinaryOperation::xor(s, ellipse, grouped)),
        h.build(|s| ConvertToPath::new(s, vec![rect, ellipse])),
    ];
    for command in commands {
        h.assert_symmetric(command);
    }
}

#[test]
fn test_undo_symmetry_text_and_swatch_commands() {
    let mut h = Harness::new();
    let text = h.text;

    let commands = vec![
        h.build(|s| InsertText::new(s, text, 5, ",")),
        h.build(|s| RemoveText::new(s, text, 0, 6)),
        h.build(|s| SetTextFormat::new(s, text, Format::range(2, 4).with_font_weight(FontWeight::BOLD))),
    ];
    for command in commands {
        h.assert_symmetric(command);
    }

    let accent = Swatch::new("accent", Paint::solid(Color::RED));
    let add = h.engine.read(|doc| AddSwatch::new(doc, accent, Some(0))).unwrap().unwrap();
    h.assert_symmetric(Box::new(add));
    let remove = h.engine.read(|doc| RemoveSwatch::new(doc, "brand")).unwrap().unwrap();
    h.assert_symmetric(Box::new(remove));
}

// =============================================================================
// History
// =============================================================================

#[test]
fn test_history_discards_redo_branch() {
    let mut h = Harness::new();
    let rect = h.rect;

    h.engine.execute(h.build(|s| SetOpacity::new(s, vec![rect], 0.5))).unwrap();
    h.engine.execute(h.build(|s| SetOpacity::new(s, vec![rect], 0.2))).unwrap();
    h.engine.undo().unwrap();
    assert!(h.engine.can_redo());

    h.engine.execute(h.build(|s| SetVisibility::new(s, vec![rect], false))).unwrap();
    assert!(!h.engine.can_redo());
    assert!(matches!(h.engine.redo(), Err(EditError::RedoStackEmpty)));
    assert_eq!(h.engine.history().len(), 2);
    assert_eq!(h.opacity(rect), 0.5);
}

#[test]
fn test_history_limit_drops_oldest() {
    let mut doc = Document::new();
    let root = doc.scene.root_id();
    let rect = doc.scene.insert_layer(Layer::rectangle(0.0, 0.0, 1.0, 1.0), root, None).unwrap();
    let config = EngineConfig {
        max_history: 3,
        ..EngineConfig::default()
    };
    let mut engine = EditingEngine::with_config(doc, config).unwrap();

    for i in 1..=5 {
        let cmd = engine
            .read(|doc| TransformLayers::translate(&doc.scene, vec![rect], i as f64, 0.0))
            .unwrap()
            .unwrap();
        engine.execute(Box::new(cmd)).unwrap();
    }
    assert_eq!(engine.history().len(), 3);

    while engine.can_undo() {
        engine.undo().unwrap();
    }
    // Only the last three moves (3 + 4 + 5) were undone
    let offset = engine
        .read(|doc| doc.scene.get(rect).unwrap().transform().translation.x)
        .unwrap();
    assert_eq!(offset, 3.0);
}

// =============================================================================
// Merging
// =============================================================================

#[test]
fn test_merged_opacity_equals_summed_delta() {
    let mut merged = Harness::new();
    let mut single = Harness::new();
    let start = CommandMeta::new();

    for delta in [-0.2, -0.3] {
        let rect = merged.rect;
        let cmd = merged
            .engine
            .read(|doc| ChangeOpacity::new(&doc.scene, vec![rect], delta))
            .unwrap()
            .unwrap()
            .with_meta(CommandMeta::with_time(start.time));
        merged.engine.execute_merged(Box::new(cmd)).unwrap();
    }
    let rect = single.rect;
    single.engine.execute(single.build(|s| ChangeOpacity::new(s, vec![rect], -0.5))).unwrap();

    assert_eq!(merged.engine.history().len(), 1);
    assert!((merged.opacity(merged.rect) - single.opacity(single.rect)).abs() < 1e-6);

    merged.engine.undo().unwrap();
    assert_eq!(merged.opacity(merged.rect), 1.0);
}

#[test]
fn test_drag_merges_into_one_move() {
    let mut h = Harness::new();
    let rect = h.rect;
    let start = h.absolute(rect);
    let meta = CommandMeta::new();

    for _ in 0..10 {
        let cmd = h
            .engine
            .read(|doc| TransformLayers::translate(&doc.scene, vec![rect], 1.5, -0.5))
            .unwrap()
            .unwrap()
            .with_meta(CommandMeta::with_time(meta.time));
        h.engine.execute_merged(Box::new(cmd)).unwrap();
    }
    assert_eq!(h.engine.history().len(), 1);
    assert_eq!(h.engine.history().undo_description(), Some("Move"));
    assert!(affine_approx_eq(h.absolute(rect), Affine::translate((15.0, -5.0)) * start, 1e-9));

    h.engine.undo().unwrap();
    assert!(affine_approx_eq(h.absolute(rect), start, 1e-9));
}

#[test]
fn test_seal_splits_gestures() {
    let mut h = Harness::new();
    let rect = h.rect;
    let meta = CommandMeta::new();

    for seal in [false, true] {
        if seal {
            h.engine.seal();
        }
        let cmd = h
            .engine
            .read(|doc| ChangeOpacity::new(&doc.scene, vec![rect], -0.1))
            .unwrap()
            .unwrap()
            .with_meta(CommandMeta::with_time(meta.time));
        h.engine.execute_merged(Box::new(cmd)).unwrap();
    }
    assert_eq!(h.engine.history().len(), 2);
}

#[test]
fn test_typing_burst_is_one_entry() {
    let mut h = Harness::new();
    let text = h.text;
    let meta = CommandMeta::new();

    for (i, c) in "abc".chars().enumerate() {
        let cmd = h
            .engine
            .read(|doc| InsertText::new(&doc.scene, text, 11 + i, c.to_string()))
            .unwrap()
            .unwrap()
            .with_meta(CommandMeta::with_time(meta.time));
        h.engine.execute_merged(Box::new(cmd)).unwrap();
    }
    assert_eq!(h.engine.history().len(), 1);

    let value = |h: &Harness| {
        h.engine
            .read(|doc| doc.scene.get(text).unwrap().kind().as_text().unwrap().value().to_string())
            .unwrap()
    };
    assert_eq!(value(&h), "hello worldabc");
    h.engine.undo().unwrap();
    assert_eq!(value(&h), "hello world");
    h.engine.redo().unwrap();
    assert_eq!(value(&h), "hello worldabc");
}

// =============================================================================
// Structural scenarios
// =============================================================================

#[test]
fn test_nested_translation_and_move_to_top() {
    let mut h = Harness::new();
    let (group, grouped) = (h.group, h.grouped);

    assert!(affine_approx_eq(h.absolute(grouped), Affine::translate((15.0, 15.0)), 1e-12));

    let sibling = h.build(|s| AddLayer::new(s, Layer::rectangle(0.0, 0.0, 1.0, 1.0), group, Some(0)));
    h.engine.execute(sibling).unwrap();
    assert_eq!(h.index_of(grouped), Some(1));

    h.engine.execute(h.build(|s| ChangeZIndex::new(s, vec![grouped], -100_000_000))).unwrap();
    assert_eq!(h.index_of(grouped), Some(0));

    h.engine.undo().unwrap();
    assert_eq!(h.index_of(grouped), Some(1));
}

#[test]
fn test_clamped_move_is_reversible() {
    let mut h = Harness::new();
    let rect = h.rect;
    let last = h.engine.read(|doc| doc.scene.children(doc.scene.root_id()).len() - 1).unwrap();

    h.engine.execute(h.build(|s| ChangeZIndex::new(s, vec![rect], 1_000))).unwrap();
    assert_eq!(h.index_of(rect), Some(last));
    h.engine.undo().unwrap();
    assert_eq!(h.index_of(rect), Some(0));
}

#[test]
fn test_group_then_ungroup_restores_placement() {
    let mut h = Harness::new();
    let (root, rect, ellipse) = (h.root, h.rect, h.ellipse);

    let parent = h.build(|s| {
        AddLayer::new(
            s,
            Layer::group().with_transform(Transform::new(
                edit_engine::scene_model::kurbo::Vec2::new(1.5, 0.75),
                0.2,
                0.4,
                edit_engine::scene_model::kurbo::Vec2::new(-3.0, 8.0),
            )),
            root,
            None,
        )
    });
    h.engine.execute(parent).unwrap();
    let outer = h.engine.read(|doc| *doc.scene.children(root).last().unwrap()).unwrap();

    // Move rect and ellipse into the transformed parent
    h.engine.execute(h.build(|s| RemoveLayers::new(s, vec![rect, ellipse]))).unwrap();
    h.engine.execute(h.build(|s| AddLayer::existing(s, rect, outer, None))).unwrap();
    h.engine.execute(h.build(|s| AddLayer::existing(s, ellipse, outer, None))).unwrap();

    let before = [(h.index_of(rect), h.absolute(rect)), (h.index_of(ellipse), h.absolute(ellipse))];

    let group = h
        .engine
        .read(|doc| GroupLayers::new(&doc.scene, vec![rect, ellipse]))
        .unwrap()
        .unwrap();
    let group_id = group.group_id();
    h.engine.execute(Box::new(group)).unwrap();
    h.engine
        .execute(h.build(|s| TransformLayers::local(s, vec![group_id], Affine::rotate(0.3))))
        .unwrap();
    h.engine.undo().unwrap();
    h.engine.execute(h.build(|s| UngroupLayers::new(s, vec![group_id]))).unwrap();

    for (id, (index, absolute)) in [rect, ellipse].into_iter().zip(before) {
        assert_eq!(h.engine.read(|doc| doc.scene.parent(id)).unwrap(), Some(outer));
        assert_eq!(h.index_of(id), index);
        assert!(affine_approx_eq(h.absolute(id), absolute, 1e-9));
    }
}

#[test]
fn test_failed_command_is_not_recorded() {
    let mut h = Harness::new();
    let rect = h.rect;
    let cmd = h.build(|s| RemoveLayers::new(s, vec![rect]));
    // Removing it once more detaches nothing and must not reach the history
    let again = h.build(|s| RemoveLayers::new(s, vec![rect]));

    h.engine.execute(cmd).unwrap();
    let len = h.engine.history().len();
    assert!(h.engine.execute(again).is_err());
    assert_eq!(h.engine.history().len(), len);
}

#[test]
fn test_unsupported_boolean_outline_is_not_recorded() {
    let mut h = Harness::new();
    let (rect, ellipse) = (h.rect, h.ellipse);
    h.engine.execute(h.build(|s| TransformLayers::translate(s, vec![ellipse], 8.0, 0.0))).unwrap();
    let before = h.snapshot();
    let len = h.engine.history().len();

    for op in [CombineOp::Intersect, CombineOp::Xor, CombineOp::Exclude] {
        let cmd = h.build(|s| BinaryOperation::new(s, op, rect, ellipse));
        assert!(h.engine.execute(cmd).is_err(), "{:?} of overlapping shapes", op);
    }
    assert_eq!(h.engine.history().len(), len);
    assert_eq!(before, h.snapshot());

    // Union outlines are exact, so that one goes through
    h.engine.execute(h.build(|s| BinaryOperation::union(s, rect, ellipse))).unwrap();
    assert_eq!(h.engine.history().len(), len + 1);
}

#[test]
fn test_precondition_failures_mutate_nothing() {
    let h = Harness::new();
    let (root, text, rect) = (h.root, h.text, h.rect);
    let before = h.snapshot();

    let attempts: Vec<Result<Box<dyn Command>>> = vec![
        h.engine.read(|doc| RemoveLayers::new(&doc.scene, vec![root]).map(|c| Box::new(c) as Box<dyn Command>)).unwrap(),
        h.engine.read(|doc| InsertText::new(&doc.scene, rect, 0, "x").map(|c| Box::new(c) as Box<dyn Command>)).unwrap(),
        h.engine.read(|doc| RemoveText::new(&doc.scene, text, 10, 5).map(|c| Box::new(c) as Box<dyn Command>)).unwrap(),
        h.engine.read(|doc| BinaryOperation::union(&doc.scene, rect, rect).map(|c| Box::new(c) as Box<dyn Command>)).unwrap(),
        h.engine.read(|doc| ConvertToPath::new(&doc.scene, vec![root]).map(|c| Box::new(c) as Box<dyn Command>)).unwrap(),
        h.engine.read(|doc| ConvertToPath::new(&doc.scene, vec![text]).map(|c| Box::new(c) as Box<dyn Command>)).unwrap(),
        h.engine.read(|doc| AddLayer::new(&doc.scene, Layer::group(), rect, None).map(|c| Box::new(c) as Box<dyn Command>)).unwrap(),
        h.engine.read(|doc| AddLayer::new(&doc.scene, Layer::group(), root, Some(9)).map(|c| Box::new(c) as Box<dyn Command>)).unwrap(),
        h.engine.read(|doc| AddSwatch::new(doc, Swatch::new("brand", Paint::solid(Color::RED)), None).map(|c| Box::new(c) as Box<dyn Command>)).unwrap(),
        h.engine.read(|doc| RemoveSwatch::new(doc, "missing").map(|c| Box::new(c) as Box<dyn Command>)).unwrap(),
        h.engine.read(|doc| {
            SetTextFormat::new(&doc.scene, text, Format::range(1, usize::MAX).with_font_weight(FontWeight::BOLD))
                .map(|c| Box::new(c) as Box<dyn Command>)
        })
        .unwrap(),
    ];
    for attempt in attempts {
        assert!(matches!(attempt, Err(EditError::PreconditionViolation(_)) | Err(EditError::Scene(_))));
    }
    assert_eq!(before, h.snapshot());
}

// =============================================================================
// Property tests
// =============================================================================

#[derive(Debug, Clone)]
enum TextEdit {
    Insert(usize, String),
    Remove(usize, usize),
    Bold(usize, usize),
}

fn text_edit() -> impl Strategy<Value = TextEdit> {
    prop_oneof![
        (0usize..40, "[a-zé]{1,4}").prop_map(|(p, s)| TextEdit::Insert(p, s)),
        (0usize..40, 1usize..6).prop_map(|(p, n)| TextEdit::Remove(p, n)),
        (0usize..40, 1usize..8).prop_map(|(p, n)| TextEdit::Bold(p, n)),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_text_edits_keep_formats_valid_and_undo_exactly(edits in prop::collection::vec(text_edit(), 1..12)) {
        let mut h = Harness::new();
        let text = h.text;
        let before = h.snapshot();
        let len = |h: &Harness| {
            h.engine.read(|doc| doc.scene.get(text).unwrap().kind().as_text().unwrap().char_len()).unwrap()
        };

        let mut applied = 0;
        for edit in edits {
            let current = len(&h);
            let command: Option<Box<dyn Command>> = match edit {
                TextEdit::Insert(p, s) => Some(h.build(|sc| InsertText::new(sc, text, p.min(current), s))),
                TextEdit::Remove(p, n) if current > 0 => {
                    let p = p % current;
                    let n = n.min(current - p);
                    Some(h.build(|sc| RemoveText::new(sc, text, p, n)))
                }
                TextEdit::Bold(p, n) if current > 0 => {
                    let p = p % current;
                    Some(h.build(|sc| SetTextFormat::new(sc, text, Format::range(p, n).with_font_weight(FontWeight::BOLD))))
                }
                _ => None,
            };
            if let Some(command) = command {
                h.engine.execute(command).unwrap();
                applied += 1;
                let valid = h.engine
                    .read(|doc| doc.scene.get(text).unwrap().kind().as_text().unwrap().validate_formats())
                    .unwrap();
                prop_assert!(valid.is_ok(), "{:?}", valid);
            }
        }

        for _ in 0..applied {
            h.engine.undo().unwrap();
        }
        prop_assert_eq!(before, h.snapshot());
    }
}
