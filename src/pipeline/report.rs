// Reporter - console summaries and the drift chart

use super::protocol::language_name;
use super::store::{StoreError, write_file};
use super::types::{PipelineRun, QualityReport};
use image::{ImageFormat, Rgb, RgbImage};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

const RULE: &str = "============================================================";

/// Side-by-side view of the first `max_display` sentences through every hop
pub fn format_translation_journey(run: &PipelineRun, distances: Option<&[f64]>, max_display: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\n{}\nTRANSLATION JOURNEY RESULTS\n{}\n", RULE, RULE);

    let shown = max_display.min(run.len());
    let source = run.source_language.to_uppercase();

    for i in 0..shown {
        let _ = writeln!(out, "Sentence {}:", i + 1);
        let _ = writeln!(out, "  {:<16}{}", format!("Original ({}):", source), run.original[i]);

        for (hop_index, hop) in run.hops.iter().enumerate() {
            let label = if hop_index + 1 == run.hops.len() {
                format!("Final ({}):", hop.language.to_uppercase())
            } else {
                format!("{} ({}):", language_name(&hop.language), hop.language.to_uppercase())
            };
            let text = hop.sentences.get(i).map(String::as_str).unwrap_or("");
            let _ = writeln!(out, "  {:<16}{}", label, text);
        }

        if let Some(distance) = distances.and_then(|d| d.get(i)) {
            let _ = writeln!(out, "  {:<16}{:.4}", "Distance:", distance);
        }
        out.push('\n');
    }

    if run.len() > shown {
        let _ = writeln!(out, "... and {} more sentences\n", run.len() - shown);
    }
    out.push_str(RULE);
    out
}

pub fn format_statistics(report: &QualityReport) -> String {
    format!(
        "\n{rule}\nQUALITY METRICS SUMMARY\n{rule}\n\
         Total Sentences:     {}\n\
         Mean Distance:       {:.4}\n\
         Std Deviation:       {:.4}\n\
         Min Distance:        {:.4}\n\
         Max Distance:        {:.4}\n\
         Median Distance:     {:.4}\n\
         {rule}",
        report.num_sentences,
        report.mean_distance,
        report.std_distance,
        report.min_distance,
        report.max_distance,
        report.median_distance,
        rule = RULE,
    )
}

/// Per-hop success / low-confidence / failure counts
pub fn format_hop_summary(run: &PipelineRun) -> String {
    let mut out = format!("\n{}\nHOP SUMMARY\n{}\n", RULE, RULE);
    for (index, hop) in run.hops.iter().enumerate() {
        let _ = writeln!(
            out,
            "Hop {} {:<28} ok: {:>3}  low confidence: {:>3}  failed: {:>3}",
            index + 1,
            hop.agent_id,
            hop.stats.succeeded,
            hop.stats.low_confidence,
            hop.stats.failed
        );
    }
    out.push_str(RULE);
    out
}

/// Which of `paths` exist, with their sizes
pub fn format_file_summary(paths: &[PathBuf]) -> String {
    let mut out = format!("\n{}\nFILES GENERATED\n{}\n", RULE, RULE);
    for path in paths {
        if let Ok(meta) = std::fs::metadata(path) {
            let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
            let _ = writeln!(out, "✓ {} ({:.1} KB)", name, meta.len() as f64 / 1024.0);
        }
    }
    out.push_str(RULE);
    out
}

pub fn print_translation_journey(run: &PipelineRun, distances: Option<&[f64]>, max_display: usize) {
    println!("{}", format_translation_journey(run, distances, max_display));
}

pub fn print_statistics(report: &QualityReport) {
    println!("{}", format_statistics(report));
}

pub fn print_hop_summary(run: &PipelineRun) {
    println!("{}", format_hop_summary(run));
}

pub fn print_file_summary(paths: &[PathBuf]) {
    println!("{}", format_file_summary(paths));
}

// ---------------------------------------------------------------------------
// Chart
// ---------------------------------------------------------------------------

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const GRID: Rgb<u8> = Rgb([225, 225, 225]);
const AXIS: Rgb<u8> = Rgb([40, 40, 40]);
const SERIES: Rgb<u8> = Rgb([46, 134, 171]);
const MEAN: Rgb<u8> = Rgb([230, 57, 70]);
const MARGIN: u32 = 50;

/// Per-sentence distance as a line with markers, plus a dashed mean line.
///
/// The y axis starts at 0 and extends just past the largest distance
/// (never beyond 2.0). Grid lines mark every 0.1.
pub fn render_quality_chart(distances: &[f64], mean: f64, width: u32, height: u32) -> RgbImage {
    let width = width.max(MARGIN * 2 + 10);
    let height = height.max(MARGIN * 2 + 10);
    let mut img = RgbImage::from_pixel(width, height, BACKGROUND);

    let left = MARGIN as f64;
    let right = (width - MARGIN) as f64;
    let top = MARGIN as f64;
    let bottom = (height - MARGIN) as f64;

    let peak = distances.iter().copied().fold(mean, f64::max);
    let y_max = ((peak * 1.1).max(0.1) * 10.0).ceil() / 10.0;
    let y_max = y_max.min(2.0);

    let to_y = |value: f64| bottom - (value.clamp(0.0, y_max) / y_max) * (bottom - top);
    let to_x = |index: usize| {
        if distances.len() <= 1 {
            (left + right) / 2.0
        } else {
            left + index as f64 * (right - left) / (distances.len() - 1) as f64
        }
    };

    // Horizontal grid every 0.1
    let steps = (y_max * 10.0).round() as usize;
    for step in 1..=steps {
        let y = to_y(step as f64 / 10.0);
        draw_line(&mut img, (left, y), (right, y), GRID);
    }

    draw_line(&mut img, (left, top), (left, bottom), AXIS);
    draw_line(&mut img, (left, bottom), (right, bottom), AXIS);

    // Series, two pixels thick
    let points: Vec<(f64, f64)> = distances.iter().enumerate().map(|(i, d)| (to_x(i), to_y(*d))).collect();
    for pair in points.windows(2) {
        draw_line(&mut img, pair[0], pair[1], SERIES);
        draw_line(&mut img, (pair[0].0, pair[0].1 + 1.0), (pair[1].0, pair[1].1 + 1.0), SERIES);
    }
    for point in &points {
        fill_circle(&mut img, *point, 4.0, SERIES);
    }

    // Dashed mean line
    let mean_y = to_y(mean);
    let mut x = left;
    while x < right {
        let end = (x + 10.0).min(right);
        draw_line(&mut img, (x, mean_y), (end, mean_y), MEAN);
        draw_line(&mut img, (x, mean_y + 1.0), (end, mean_y + 1.0), MEAN);
        x += 16.0;
    }

    img
}

/// Render the chart for `report` and write it as PNG
pub async fn save_quality_chart(report: &QualityReport, path: &Path, width: u32, height: u32) -> Result<(), StoreError> {
    let img = render_quality_chart(&report.distances, report.mean_distance, width, height);

    let mut bytes = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|e| StoreError::Image(e.to_string()))?;

    write_file(path, &bytes).await?;
    tracing::info!(path = %path.display(), "Saved chart ({:.0} KB)", bytes.len() as f64 / 1024.0);
    Ok(())
}

fn plot(img: &mut RgbImage, x: i64, y: i64, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < img.width() && (y as u32) < img.height() {
        img.put_pixel(x as u32, y as u32, color);
    }
}

// Bresenham
fn draw_line(img: &mut RgbImage, from: (f64, f64), to: (f64, f64), color: Rgb<u8>) {
    let (mut x0, mut y0) = (from.0.round() as i64, from.1.round() as i64);
    let (x1, y1) = (to.0.round() as i64, to.1.round() as i64);
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        plot(img, x0, y0, color);
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

fn fill_circle(img: &mut RgbImage, center: (f64, f64), radius: f64, color: Rgb<u8>) {
    let r = radius.ceil() as i64;
    let (cx, cy) = (center.0.round() as i64, center.1.round() as i64);
    for dy in -r..=r {
        for dx in -r..=r {
            if ((dx * dx + dy * dy) as f64) <= radius * radius {
                plot(img, cx + dx, cy + dy, color);
            }
        }
    }
}
