//! Pipeline tests: content stream in, staged SVG primitives out.

use std::sync::Arc;

use kurbo::{BezPath, Rect, Shape};
use rustc_hash::FxHashMap;
use verso_interpret::resource::{NoResources, ResourceResolver, ResourceResult};
use verso_interpret::{
    ColorSpace, Font, InterpreterSettings, Operand, OutlineProvider, Page, PageGeometry,
    RawOperation, RenderTarget, Session,
};
use verso_svg::{ClipId, CollectSink, SvgElement};

fn num(v: f64) -> Operand {
    Operand::Number(v)
}

fn op(operator: &str, operands: Vec<Operand>) -> RawOperation {
    RawOperation::new(operator, operands)
}

fn page(width: f64, height: f64, content: Vec<RawOperation>) -> Page {
    Page {
        geometry: PageGeometry::new(Rect::new(0.0, 0.0, width, height), None, 0),
        content,
        annotations: vec![],
    }
}

fn convert(page: &Page, resources: &dyn ResourceResolver) -> CollectSink {
    convert_with(page, resources, &InterpreterSettings::default())
}

fn convert_with(
    page: &Page,
    resources: &dyn ResourceResolver,
    settings: &InterpreterSettings,
) -> CollectSink {
    let session = Session::new();
    let mut sink = CollectSink::default();
    verso_svg::convert(
        page,
        resources,
        &session,
        settings,
        RenderTarget::Screen,
        &mut sink,
    )
    .unwrap();

    sink
}

#[test]
fn fills_come_out_as_flipped_two_decimal_paths() {
    let p = page(
        300.0,
        200.0,
        vec![
            op("rg", vec![num(1.0), num(0.0), num(0.0)]),
            op("re", vec![num(0.0), num(0.0), num(100.0), num(100.0)]),
            op("f", vec![]),
        ],
    );
    let sink = convert(&p, &NoResources);

    assert_eq!(sink.elements.len(), 1);
    match &sink.elements[0] {
        SvgElement::Path(path) => {
            assert_eq!(path.d, "M0,200 L100,200 L100,100 L0,100 Z");
            assert_eq!(path.fill, "#ff0000");
            assert_eq!(path.stroke, "none");
            assert!(path.clip.is_none());
        }
        other => panic!("expected a path, got {other:?}"),
    }
}

#[test]
fn clip_registry_assigns_one_based_stable_ids() {
    let clip_ops = |x: f64| {
        vec![
            op("re", vec![num(x), num(0.0), num(50.0), num(50.0)]),
            op("W", vec![]),
            op("n", vec![]),
        ]
    };

    let mut content = vec![op("q", vec![])];
    content.extend(clip_ops(0.0));
    content.extend([
        op("re", vec![num(0.0), num(0.0), num(10.0), num(10.0)]),
        op("f", vec![]),
        op("Q", vec![]),
        op("q", vec![]),
    ]);
    // The identical clip again: must reuse clipPath1.
    content.extend(clip_ops(0.0));
    content.extend([
        op("re", vec![num(0.0), num(0.0), num(10.0), num(10.0)]),
        op("f", vec![]),
        op("Q", vec![]),
        op("q", vec![]),
    ]);
    // A different clip: gets clipPath2.
    content.extend(clip_ops(20.0));
    content.extend([
        op("re", vec![num(0.0), num(0.0), num(10.0), num(10.0)]),
        op("f", vec![]),
        op("Q", vec![]),
    ]);

    let sink = convert(&page(100.0, 100.0, content), &NoResources);

    let clips: Vec<Option<ClipId>> = sink
        .elements
        .iter()
        .map(|e| match e {
            SvgElement::Path(p) => p.clip,
            _ => None,
        })
        .collect();

    assert_eq!(clips, vec![Some(ClipId(1)), Some(ClipId(1)), Some(ClipId(2))]);
    assert_eq!(sink.clip_defs.len(), 2, "each unique geometry defined once");
    assert_eq!(sink.clip_defs[0].id.to_string(), "clipPath1");
    assert_eq!(sink.clip_defs[1].id.to_string(), "clipPath2");
}

struct BoxOutlines;

impl OutlineProvider for BoxOutlines {
    fn outline(&self, _: &Font, _: u16) -> Option<BezPath> {
        Some(Rect::new(0.0, 0.0, 500.0, 700.0).to_path(0.1))
    }
}

struct FontResources(Arc<Font>);

impl ResourceResolver for FontResources {
    fn font(&self, _: &str) -> ResourceResult<Arc<Font>> {
        Ok(Some(self.0.clone()))
    }

    fn color_space(&self, _: &str) -> ResourceResult<ColorSpace> {
        Ok(None)
    }

    fn shading(&self, _: &str) -> ResourceResult<Arc<verso_interpret::resource::Shading>> {
        Ok(None)
    }

    fn pattern(&self, _: &str) -> ResourceResult<Arc<verso_interpret::resource::Pattern>> {
        Ok(None)
    }

    fn x_object(&self, _: &str) -> ResourceResult<verso_interpret::resource::XObject> {
        Ok(None)
    }

    fn ext_g_state(&self, _: &str) -> ResourceResult<verso_interpret::resource::ExtGState> {
        Ok(None)
    }
}

fn helvetica() -> Arc<Font> {
    Arc::new(Font {
        id: 1,
        family: "Helvetica".into(),
        weight: 700,
        italic: false,
        embedded: true,
        code_len: 1,
        matrix: Font::default_matrix(),
        widths: FxHashMap::from_iter([(65, 600.0)]),
        default_width: 500.0,
        unicode: Some(Arc::new(FxHashMap::from_iter([(65, 'A')]))),
    })
}

fn show_text(ops_before_tj: Vec<RawOperation>, text: &[u8]) -> Vec<RawOperation> {
    let mut content = vec![
        op("BT", vec![]),
        op("Tf", vec![Operand::Name("F1".into()), num(24.0)]),
    ];
    content.extend(ops_before_tj);
    content.push(op("Tj", vec![Operand::String(text.to_vec())]));
    content.push(op("ET", vec![]));

    content
}

#[test]
fn text_is_emitted_with_font_metadata_and_glyph_defs() {
    let settings = InterpreterSettings {
        outline_provider: Arc::new(BoxOutlines),
        ..InterpreterSettings::default()
    };

    let content = show_text(
        vec![op(
            "Tm",
            vec![num(1.0), num(0.0), num(0.0), num(1.0), num(10.0), num(50.0)],
        )],
        b"AA",
    );
    let sink = convert_with(
        &page(300.0, 200.0, content),
        &FontResources(helvetica()),
        &settings,
    );

    let texts: Vec<_> = sink
        .elements
        .iter()
        .filter_map(|e| match e {
            SvgElement::Text(t) => Some(t),
            _ => None,
        })
        .collect();

    assert_eq!(texts.len(), 2);
    let first = texts[0];
    assert_eq!((first.x, first.y), (10.0, 150.0));
    assert_eq!(first.font_family, "Helvetica");
    assert_eq!(first.font_size, 24.0);
    assert!(first.bold);
    assert_eq!(first.unicode.as_deref(), Some("A"));
    assert_eq!(first.width, 0.6);
    assert!(first.rotation.is_none(), "upright text carries no transform");

    // Both glyphs are the same (font, code) pair: one definition,
    // referenced twice.
    assert_eq!(sink.glyph_defs.len(), 1);
    assert!(texts.iter().all(|t| t.glyph.is_some()));

    // The second glyph advanced by 600/1000 * 24pt.
    assert!((texts[1].x - texts[0].x - 14.4).abs() < 0.01);
}

#[test]
fn rotated_text_keeps_an_inspectable_transform() {
    let settings = InterpreterSettings {
        outline_provider: Arc::new(BoxOutlines),
        ..InterpreterSettings::default()
    };

    // 90-degree rotation in the text matrix.
    let content = show_text(
        vec![op(
            "Tm",
            vec![num(0.0), num(1.0), num(-1.0), num(0.0), num(100.0), num(100.0)],
        )],
        b"A",
    );
    let sink = convert_with(
        &page(300.0, 200.0, content),
        &FontResources(helvetica()),
        &settings,
    );

    match &sink.elements[0] {
        SvgElement::Text(t) => {
            assert!(t.rotation.is_some(), "rotation must not be rebaked");
            assert_eq!((t.x, t.y), (100.0, 100.0));
        }
        other => panic!("expected text, got {other:?}"),
    }
}

#[test]
fn stroked_paths_carry_device_scaled_dashes() {
    let p = page(
        100.0,
        100.0,
        vec![
            op("cm", vec![num(2.0), num(0.0), num(0.0), num(2.0), num(0.0), num(0.0)]),
            op("d", vec![Operand::Array(vec![num(4.0), num(2.0)]), num(0.0)]),
            op("w", vec![num(1.5)]),
            op("m", vec![num(0.0), num(0.0)]),
            op("l", vec![num(20.0), num(0.0)]),
            op("S", vec![]),
        ],
    );
    let sink = convert(&p, &NoResources);

    match &sink.elements[0] {
        SvgElement::Path(path) => {
            assert_eq!(path.stroke_width, Some(3.0));
            assert_eq!(path.stroke_dash.as_deref(), Some("8 4"));
            assert_eq!(path.fill, "none");
            assert_eq!(path.stroke, "#000000");
        }
        other => panic!("expected a path, got {other:?}"),
    }
}
