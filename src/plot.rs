//! Render the original spectrum with the fitted model and the corrected result.
use std::path;

use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::RGBAColor;

use crate::arrayops;
use crate::pipeline::FeatureFit;
use crate::spectrum::Spectrum;

type Curve<'a> = (&'a str, &'a [f64], RGBAColor);

pub fn draw_svg_file<P>(spectrum: &Spectrum, fit: &FeatureFit, path: P) -> Result<(), Box<dyn std::error::Error>>
where
    P: AsRef<path::Path>,
{
    let root = SVGBackend::new(&path, (640, 480)).into_drawing_area();
    draw_on(spectrum, fit, &root)
}

pub fn draw_png_file<P>(spectrum: &Spectrum, fit: &FeatureFit, path: P) -> Result<(), Box<dyn std::error::Error>>
where
    P: AsRef<path::Path>,
{
    let root = BitMapBackend::new(&path, (640, 480)).into_drawing_area();
    draw_on(spectrum, fit, &root)
}

fn is_svg(path: &path::Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("svg"))
}

/// Draw into whichever format the extension of `path` names, PNG unless it is `.svg`
pub fn draw_file<P>(spectrum: &Spectrum, fit: &FeatureFit, path: P) -> Result<(), Box<dyn std::error::Error>>
where
    P: AsRef<path::Path>,
{
    if is_svg(path.as_ref()) {
        draw_svg_file(spectrum, fit, path)
    } else {
        draw_png_file(spectrum, fit, path)
    }
}

/// Draw the spectrum alone, as loaded, to PNG or SVG by the extension of `path`
pub fn draw_spectrum_file<P>(spectrum: &Spectrum, path: P) -> Result<(), Box<dyn std::error::Error>>
where
    P: AsRef<path::Path>,
{
    if is_svg(path.as_ref()) {
        let root = SVGBackend::new(&path, (640, 480)).into_drawing_area();
        draw_spectrum_on(spectrum, &root)
    } else {
        let root = BitMapBackend::new(&path, (640, 480)).into_drawing_area();
        draw_spectrum_on(spectrum, &root)
    }
}

pub fn draw_spectrum_on<DB>(spectrum: &Spectrum, root: &DrawingArea<DB, Shift>) -> Result<(), Box<dyn std::error::Error>>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let caption = format!("Spectrum, {} pixels", spectrum.len());
    draw_curves(root, &caption, &[("original", spectrum.values(), BLACK.mix(1.0))])
}

pub fn draw_on<DB>(
    spectrum: &Spectrum,
    fit: &FeatureFit,
    root: &DrawingArea<DB, Shift>,
) -> Result<(), Box<dyn std::error::Error>>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let caption = format!("{} fit, section {}", fit.profile, fit.region);
    let curves = [
        ("original", spectrum.values(), BLACK.mix(1.0)),
        ("best fit", fit.best_fit.as_slice(), RED.mix(1.0)),
        ("corrected", fit.corrected.as_slice(), BLUE.mix(0.8)),
    ];
    draw_curves(root, &caption, &curves)
}

fn draw_curves<DB>(
    root: &DrawingArea<DB, Shift>,
    caption: &str,
    curves: &[Curve<'_>],
) -> Result<(), Box<dyn std::error::Error>>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let n = curves.iter().map(|(_, values, _)| values.len()).max().unwrap_or_default();
    let pixels: Vec<f64> = arrayops::arange(0, n);
    let (xmin, xmax) = arrayops::minmax(&pixels);
    let (ymin, ymax) = curves
        .iter()
        .map(|(_, values, _)| arrayops::minmax(*values))
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (a, b)| {
            (lo.min(a), hi.max(b))
        });
    if !(xmin < xmax && ymin <= ymax) {
        return Err(format!("Nothing finite to draw for {n} samples").into());
    }
    let pad = ((ymax - ymin) * 0.05).max(1e-6);

    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(root)
        .caption(caption, ("sans-serif", 20).into_font())
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(xmin..xmax, (ymin - pad)..(ymax + pad))?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_desc("Pixel")
        .axis_desc_style(("sans-serif", 16).into_font())
        .y_desc("Counts")
        .draw()?;

    for (label, values, color) in curves.iter().copied() {
        let points = pixels.iter().copied().zip(values.iter().copied());
        chart
            .draw_series(LineSeries::new(
                points,
                ShapeStyle {
                    color,
                    filled: false,
                    stroke_width: 1,
                },
            ))?
            .label(label)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}
