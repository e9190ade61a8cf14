//! Region cropping: one grayscale unit per region descriptor, in input order.
//!
//! The whole batch is validated before any pixels are copied. A single bad
//! descriptor fails the batch with [`ScanError::InvalidRegion`]; callers never
//! see a partial set, since positional output would be meaningless.

use crate::error::ScanError;
use crate::output::ImageUnit;
use crate::pipeline::grayscale::to_grayscale;
use crate::pipeline::sniff::ImageKind;
use crate::request::{CropBox, RegionDescriptor};
use image::DynamicImage;
use tracing::debug;

/// Canonicalise and bounds-check every descriptor against a `width × height` image.
pub fn canonical_boxes(
    regions: &[RegionDescriptor],
    width: u32,
    height: u32,
) -> Result<Vec<CropBox>, ScanError> {
    if regions.is_empty() {
        return Err(ScanError::MalformedRegions {
            reason: "region list is empty".into(),
        });
    }

    regions
        .iter()
        .enumerate()
        .map(|(index, region)| {
            let bx = region.canonicalize();
            bx.validate(width, height)
                .map_err(|reason| ScanError::InvalidRegion { index, reason })?;
            Ok(bx)
        })
        .collect()
}

/// Crop `img` into one grayscale [`ImageUnit`] per region.
///
/// Each sub-image is converted to grayscale on its own, so this works the
/// same whether or not the caller already grayscaled the source.
pub fn crop(
    img: &DynamicImage,
    regions: &[RegionDescriptor],
    source_format: ImageKind,
) -> Result<Vec<ImageUnit>, ScanError> {
    let boxes = canonical_boxes(regions, img.width(), img.height())?;

    let units = boxes
        .into_iter()
        .enumerate()
        .map(|(ordinal, bx)| {
            let sub = img.crop_imm(bx.left, bx.top, bx.width(), bx.height());
            debug!(
                ordinal,
                "Cropped {}x{} at ({},{})",
                bx.width(),
                bx.height(),
                bx.left,
                bx.top
            );
            ImageUnit::new(ordinal, to_grayscale(&sub), source_format)
        })
        .collect();

    Ok(units)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Pixel;
    use image::{Rgb, RgbImage};

    fn region(ax: u32, ay: u32, bx: u32, by: u32) -> RegionDescriptor {
        RegionDescriptor::new(Pixel::new(ax, ay), Pixel::new(bx, by))
    }

    fn striped(width: u32, height: u32) -> DynamicImage {
        // Each column's red channel encodes its x position (mod 256).
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, _| {
            Rgb([(x % 256) as u8, (x % 256) as u8, (x % 256) as u8])
        }))
    }

    #[test]
    fn single_region_matches_expected_box() {
        let img = striped(1000, 800);
        let units = crop(&img, &[region(127, 249, 983, 309)], ImageKind::Png).unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].ordinal, 0);
        assert_eq!(units[0].dimensions(), (856, 60));
        // Left edge of the crop is column 127 of the source.
        assert_eq!(units[0].pixels.get_pixel(0, 0).0[0], 127);
    }

    #[test]
    fn units_follow_descriptor_order() {
        let img = striped(200, 100);
        let regions = [
            region(50, 0, 60, 10),
            region(10, 0, 20, 10),
            region(30, 10, 40, 0),
        ];
        let units = crop(&img, &regions, ImageKind::Jpeg).unwrap();
        let firsts: Vec<u8> = units.iter().map(|u| u.pixels.get_pixel(0, 0).0[0]).collect();
        assert_eq!(firsts, vec![50, 10, 30]);
        let ordinals: Vec<usize> = units.iter().map(|u| u.ordinal).collect();
        assert_eq!(ordinals, vec![0, 1, 2]);
        assert!(units.iter().all(|u| u.source_format == ImageKind::Jpeg));
    }

    #[test]
    fn corner_order_does_not_matter() {
        let img = striped(100, 100);
        let a = crop(&img, &[region(10, 20, 70, 90)], ImageKind::Png).unwrap();
        let b = crop(&img, &[region(70, 90, 10, 20)], ImageKind::Png).unwrap();
        let c = crop(&img, &[region(10, 90, 70, 20)], ImageKind::Png).unwrap();
        assert_eq!(a[0].pixels, b[0].pixels);
        assert_eq!(a[0].pixels, c[0].pixels);
    }

    #[test]
    fn one_bad_region_fails_whole_batch() {
        let img = striped(100, 100);
        let regions = [region(0, 0, 10, 10), region(90, 90, 120, 95)];
        match crop(&img, &regions, ImageKind::Png) {
            Err(ScanError::InvalidRegion { index, .. }) => assert_eq!(index, 1),
            other => panic!("expected InvalidRegion, got {other:?}"),
        }
    }

    #[test]
    fn zero_area_region_rejected() {
        let img = striped(100, 100);
        assert!(matches!(
            crop(&img, &[region(5, 5, 5, 50)], ImageKind::Png),
            Err(ScanError::InvalidRegion { index: 0, .. })
        ));
    }

    #[test]
    fn empty_region_list_rejected() {
        let img = striped(10, 10);
        assert!(matches!(
            crop(&img, &[], ImageKind::Png),
            Err(ScanError::MalformedRegions { .. })
        ));
    }
}
