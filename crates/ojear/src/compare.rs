//! Match-policy image comparison.
//!
//! Implements the three tolerance rules a checkpoint can request:
//! `Exact` (pixel-level equivalence), `IgnoreColors` (structure and text must
//! match, hue may drift), and `LayoutOnly` (block structure must match, copy
//! and graphics may change). Comparison runs on decoded PNG data; a mismatch
//! produces a red-highlight diff image for triage.

use crate::result::{OjearError, OjearResult};
use crate::visual::MatchPolicy;
use image::{GenericImageView, ImageEncoder, Rgba};

/// Per-channel slack for `IgnoreColors` luminance comparison
const LUMA_SLACK: u8 = 12;

/// Fraction of pixels allowed to differ under `IgnoreColors` (anti-aliasing)
const IGNORE_COLORS_RATIO: f64 = 0.001;

/// Block edge length in pixels for `LayoutOnly` comparison
const LAYOUT_BLOCK: u32 = 16;

/// Mean-luminance slack per block for `LayoutOnly`
const LAYOUT_SLACK: f64 = 32.0;

/// Fraction of blocks allowed to differ under `LayoutOnly`
const LAYOUT_RATIO: f64 = 0.02;

/// Result of comparing a capture against its baseline
#[derive(Debug, Clone)]
pub struct DiffReport {
    /// Whether the images match under the requested policy
    pub matches: bool,
    /// Number of differing units (pixels, or blocks for `LayoutOnly`)
    pub diff_count: usize,
    /// Total units compared
    pub total_count: usize,
    /// Differing fraction as a percentage (0.0-100.0)
    pub diff_percentage: f64,
    /// Diff image (PNG, differences highlighted in red); present on mismatch
    pub diff_image: Option<Vec<u8>>,
}

impl DiffReport {
    /// One-line mismatch summary for failure messages
    #[must_use]
    pub fn summary(&self, policy: MatchPolicy) -> String {
        let unit = match policy {
            MatchPolicy::LayoutOnly => "blocks",
            MatchPolicy::Exact | MatchPolicy::IgnoreColors => "pixels",
        };
        format!(
            "{:.2}% of {unit} differ ({}/{}) under {} policy",
            self.diff_percentage,
            self.diff_count,
            self.total_count,
            policy.as_str()
        )
    }
}

/// Compare a captured image against a baseline under a match policy.
///
/// # Errors
///
/// Returns `ImageComparisonError` when either image cannot be decoded or
/// their dimensions differ — a dimension change is an environment problem,
/// not a visual mismatch.
pub fn compare(actual: &[u8], baseline: &[u8], policy: MatchPolicy) -> OjearResult<DiffReport> {
    let actual_img = decode(actual, "captured image")?;
    let baseline_img = decode(baseline, "baseline image")?;

    let (width, height) = actual_img.dimensions();
    let (base_width, base_height) = baseline_img.dimensions();
    if width != base_width || height != base_height {
        return Err(OjearError::ImageComparisonError {
            message: format!(
                "dimensions differ: captured {width}x{height}, baseline {base_width}x{base_height}"
            ),
        });
    }

    match policy {
        MatchPolicy::Exact => compare_exact(&actual_img, &baseline_img),
        MatchPolicy::IgnoreColors => compare_luminance(&actual_img, &baseline_img),
        MatchPolicy::LayoutOnly => compare_layout(&actual_img, &baseline_img),
    }
}

fn decode(data: &[u8], what: &str) -> OjearResult<image::DynamicImage> {
    image::load_from_memory(data).map_err(|e| OjearError::ImageComparisonError {
        message: format!("failed to decode {what}: {e}"),
    })
}

fn compare_exact(
    actual: &image::DynamicImage,
    baseline: &image::DynamicImage,
) -> OjearResult<DiffReport> {
    let (width, height) = actual.dimensions();
    let actual_rgba = actual.to_rgba8();
    let baseline_rgba = baseline.to_rgba8();

    let mut diff_img = image::RgbaImage::new(width, height);
    let mut diff_count = 0usize;

    for y in 0..height {
        for x in 0..width {
            let a = *actual_rgba.get_pixel(x, y);
            let b = *baseline_rgba.get_pixel(x, y);
            if pixel_diff(a, b) > 0 {
                diff_count += 1;
                diff_img.put_pixel(x, y, Rgba([255, 0, 0, 255]));
            } else {
                diff_img.put_pixel(x, y, dimmed(a));
            }
        }
    }

    finish_pixel_report(diff_count, width, height, diff_count == 0, &diff_img)
}

fn compare_luminance(
    actual: &image::DynamicImage,
    baseline: &image::DynamicImage,
) -> OjearResult<DiffReport> {
    let (width, height) = actual.dimensions();
    let actual_luma = actual.to_luma8();
    let baseline_luma = baseline.to_luma8();
    let actual_rgba = actual.to_rgba8();

    let mut diff_img = image::RgbaImage::new(width, height);
    let mut diff_count = 0usize;

    for y in 0..height {
        for x in 0..width {
            let a = actual_luma.get_pixel(x, y).0[0];
            let b = baseline_luma.get_pixel(x, y).0[0];
            if a.abs_diff(b) > LUMA_SLACK {
                diff_count += 1;
                diff_img.put_pixel(x, y, Rgba([255, 0, 0, 255]));
            } else {
                diff_img.put_pixel(x, y, dimmed(*actual_rgba.get_pixel(x, y)));
            }
        }
    }

    let total = (width * height) as usize;
    let matches = total == 0 || (diff_count as f64 / total as f64) <= IGNORE_COLORS_RATIO;
    finish_pixel_report(diff_count, width, height, matches, &diff_img)
}

fn compare_layout(
    actual: &image::DynamicImage,
    baseline: &image::DynamicImage,
) -> OjearResult<DiffReport> {
    let (width, height) = actual.dimensions();
    let actual_blocks = block_means(&actual.to_luma8(), width, height);
    let baseline_blocks = block_means(&baseline.to_luma8(), width, height);
    let actual_rgba = actual.to_rgba8();

    let blocks_x = width.div_ceil(LAYOUT_BLOCK);
    let blocks_y = height.div_ceil(LAYOUT_BLOCK);
    let total = (blocks_x * blocks_y) as usize;

    let mut differing = vec![false; total];
    let mut diff_count = 0usize;
    for (i, (a, b)) in actual_blocks.iter().zip(baseline_blocks.iter()).enumerate() {
        if (a - b).abs() > LAYOUT_SLACK {
            differing[i] = true;
            diff_count += 1;
        }
    }

    let matches = total == 0 || (diff_count as f64 / total as f64) <= LAYOUT_RATIO;

    let diff_image = if matches {
        None
    } else {
        let mut diff_img = image::RgbaImage::new(width, height);
        for y in 0..height {
            for x in 0..width {
                let block = (y / LAYOUT_BLOCK) * blocks_x + (x / LAYOUT_BLOCK);
                if differing[block as usize] {
                    diff_img.put_pixel(x, y, Rgba([255, 0, 0, 255]));
                } else {
                    diff_img.put_pixel(x, y, dimmed(*actual_rgba.get_pixel(x, y)));
                }
            }
        }
        Some(encode_png(&diff_img)?)
    };

    let diff_percentage = if total > 0 {
        (diff_count as f64 / total as f64) * 100.0
    } else {
        0.0
    };

    Ok(DiffReport {
        matches,
        diff_count,
        total_count: total,
        diff_percentage,
        diff_image,
    })
}

fn finish_pixel_report(
    diff_count: usize,
    width: u32,
    height: u32,
    matches: bool,
    diff_img: &image::RgbaImage,
) -> OjearResult<DiffReport> {
    let total = (width * height) as usize;
    let diff_percentage = if total > 0 {
        (diff_count as f64 / total as f64) * 100.0
    } else {
        0.0
    };
    let diff_image = if matches {
        None
    } else {
        Some(encode_png(diff_img)?)
    };
    Ok(DiffReport {
        matches,
        diff_count,
        total_count: total,
        diff_percentage,
        diff_image,
    })
}

/// Mean luminance per `LAYOUT_BLOCK`-sized block, row-major
fn block_means(luma: &image::GrayImage, width: u32, height: u32) -> Vec<f64> {
    let blocks_x = width.div_ceil(LAYOUT_BLOCK);
    let blocks_y = height.div_ceil(LAYOUT_BLOCK);
    let mut sums = vec![0.0f64; (blocks_x * blocks_y) as usize];
    let mut counts = vec![0u32; (blocks_x * blocks_y) as usize];

    for y in 0..height {
        for x in 0..width {
            let block = ((y / LAYOUT_BLOCK) * blocks_x + (x / LAYOUT_BLOCK)) as usize;
            sums[block] += f64::from(luma.get_pixel(x, y).0[0]);
            counts[block] += 1;
        }
    }

    sums.iter()
        .zip(counts.iter())
        .map(|(sum, count)| if *count > 0 { sum / f64::from(*count) } else { 0.0 })
        .collect()
}

/// Sum of per-channel RGB differences
fn pixel_diff(a: Rgba<u8>, b: Rgba<u8>) -> u32 {
    let Rgba([r1, g1, b1, _]) = a;
    let Rgba([r2, g2, b2, _]) = b;
    u32::from(r1.abs_diff(r2)) + u32::from(g1.abs_diff(g2)) + u32::from(b1.abs_diff(b2))
}

/// Matching pixels render dimmed so the red highlights stand out
fn dimmed(pixel: Rgba<u8>) -> Rgba<u8> {
    let Rgba([r, g, b, _]) = pixel;
    Rgba([r / 2, g / 2, b / 2, 128])
}

fn encode_png(img: &image::RgbaImage) -> OjearResult<Vec<u8>> {
    let mut buffer = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut buffer);
    encoder
        .write_image(
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgba8,
        )
        .map_err(|e| OjearError::ImageComparisonError {
            message: format!("failed to encode diff image: {e}"),
        })?;
    Ok(buffer)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn png_of(img: &image::RgbaImage) -> Vec<u8> {
        encode_png(img).unwrap()
    }

    fn solid(width: u32, height: u32, rgba: [u8; 4]) -> image::RgbaImage {
        image::RgbaImage::from_pixel(width, height, Rgba(rgba))
    }

    mod exact_tests {
        use super::*;

        #[test]
        fn test_identical_images_match() {
            let img = png_of(&solid(32, 32, [200, 200, 200, 255]));
            let report = compare(&img, &img, MatchPolicy::Exact).unwrap();
            assert!(report.matches);
            assert_eq!(report.diff_count, 0);
            assert!(report.diff_image.is_none());
        }

        #[test]
        fn test_single_pixel_change_fails_exact() {
            let baseline = solid(32, 32, [200, 200, 200, 255]);
            let mut actual = baseline.clone();
            actual.put_pixel(5, 5, Rgba([199, 200, 200, 255]));

            let report =
                compare(&png_of(&actual), &png_of(&baseline), MatchPolicy::Exact).unwrap();
            assert!(!report.matches);
            assert_eq!(report.diff_count, 1);
            assert!(report.diff_image.is_some());
        }

        #[test]
        fn test_dimension_mismatch_is_comparison_error() {
            let a = png_of(&solid(32, 32, [0, 0, 0, 255]));
            let b = png_of(&solid(16, 32, [0, 0, 0, 255]));
            let err = compare(&a, &b, MatchPolicy::Exact).unwrap_err();
            assert!(matches!(err, OjearError::ImageComparisonError { .. }));
        }

        #[test]
        fn test_garbage_data_is_comparison_error() {
            let good = png_of(&solid(8, 8, [0, 0, 0, 255]));
            let err = compare(b"not a png", &good, MatchPolicy::Exact).unwrap_err();
            assert!(matches!(err, OjearError::ImageComparisonError { .. }));
        }
    }

    mod ignore_colors_tests {
        use super::*;

        #[test]
        fn test_hue_shift_with_stable_luminance_passes() {
            let baseline = solid(32, 32, [100, 100, 100, 255]);
            // Tinted variant with near-identical luminance.
            let actual = solid(32, 32, [110, 95, 100, 255]);
            let report = compare(
                &png_of(&actual),
                &png_of(&baseline),
                MatchPolicy::IgnoreColors,
            )
            .unwrap();
            assert!(report.matches);
        }

        #[test]
        fn test_hue_shift_fails_exact() {
            let baseline = solid(32, 32, [100, 100, 100, 255]);
            let actual = solid(32, 32, [110, 95, 100, 255]);
            let report =
                compare(&png_of(&actual), &png_of(&baseline), MatchPolicy::Exact).unwrap();
            assert!(!report.matches);
        }

        #[test]
        fn test_structural_change_fails_ignore_colors() {
            let baseline = solid(32, 32, [230, 230, 230, 255]);
            let mut actual = baseline.clone();
            // A dark 8x8 box is a structural change, not a color drift.
            for y in 0..8 {
                for x in 0..8 {
                    actual.put_pixel(x, y, Rgba([10, 10, 10, 255]));
                }
            }
            let report = compare(
                &png_of(&actual),
                &png_of(&baseline),
                MatchPolicy::IgnoreColors,
            )
            .unwrap();
            assert!(!report.matches);
            assert!(report.diff_image.is_some());
        }
    }

    mod layout_tests {
        use super::*;

        #[test]
        fn test_small_copy_change_passes_layout() {
            let baseline = solid(64, 64, [240, 240, 240, 255]);
            let mut actual = baseline.clone();
            // A handful of darker pixels, as a changed word would produce.
            for x in 20..26 {
                actual.put_pixel(x, 20, Rgba([120, 120, 120, 255]));
            }
            let report =
                compare(&png_of(&actual), &png_of(&baseline), MatchPolicy::LayoutOnly).unwrap();
            assert!(report.matches);
        }

        #[test]
        fn test_moved_block_fails_layout() {
            let mut baseline = solid(64, 64, [240, 240, 240, 255]);
            for y in 0..32 {
                for x in 0..32 {
                    baseline.put_pixel(x, y, Rgba([10, 10, 10, 255]));
                }
            }
            let mut actual = solid(64, 64, [240, 240, 240, 255]);
            for y in 32..64 {
                for x in 32..64 {
                    actual.put_pixel(x, y, Rgba([10, 10, 10, 255]));
                }
            }
            let report =
                compare(&png_of(&actual), &png_of(&baseline), MatchPolicy::LayoutOnly).unwrap();
            assert!(!report.matches);
            assert!(report.diff_count > 0);
        }
    }

    mod summary_tests {
        use super::*;

        #[test]
        fn test_summary_names_policy_and_counts() {
            let report = DiffReport {
                matches: false,
                diff_count: 12,
                total_count: 1024,
                diff_percentage: 1.17,
                diff_image: None,
            };
            let summary = report.summary(MatchPolicy::Exact);
            assert!(summary.contains("12/1024"));
            assert!(summary.contains("exact"));
        }
    }
}
