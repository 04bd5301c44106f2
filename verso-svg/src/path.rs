//! Fixed-precision path and number formatting.

use std::fmt::Write;

use kurbo::{BezPath, PathEl, Point};

/// Format a number with two decimal places, trimming trailing zeros.
pub(crate) fn fmt_number(v: f64) -> String {
    let mut s = format!("{v:.2}");
    if s.contains('.') {
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
    }
    // Avoid the negative zero artifact.
    if s == "-0" {
        s = "0".into();
    }

    s
}

/// Round a number to the emitted precision.
pub(crate) fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn write_point(out: &mut String, p: Point) {
    let _ = write!(out, "{},{}", fmt_number(p.x), fmt_number(p.y));
}

/// The SVG `d` string of a path, at two decimal places.
pub(crate) fn to_svg_d(path: &BezPath) -> String {
    let mut out = String::new();

    for (i, el) in path.elements().iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        match *el {
            PathEl::MoveTo(p) => {
                out.push('M');
                write_point(&mut out, p);
            }
            PathEl::LineTo(p) => {
                out.push('L');
                write_point(&mut out, p);
            }
            PathEl::QuadTo(p1, p2) => {
                out.push('Q');
                write_point(&mut out, p1);
                out.push(' ');
                write_point(&mut out, p2);
            }
            PathEl::CurveTo(p1, p2, p3) => {
                out.push('C');
                write_point(&mut out, p1);
                out.push(' ');
                write_point(&mut out, p2);
                out.push(' ');
                write_point(&mut out, p3);
            }
            PathEl::ClosePath => out.push('Z'),
        }
    }

    out
}
