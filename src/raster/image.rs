//! Single-image documents composed onto a synthetic A4 page.

use std::io::Cursor;

use async_trait::async_trait;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

use super::{
    scaled_dimensions, PageImage, RasterError, RasterSource, A4_HEIGHT_PT, A4_WIDTH_PT,
};

/// A bare image placed, aspect preserved and centred, on one A4 page.
#[derive(Debug)]
pub struct ImageSource {
    page: PageImage,
}

impl ImageSource {
    /// Decode `bytes` and compose the page. CPU-bound; call off the async executor.
    pub fn compose(bytes: &[u8]) -> Result<Self, RasterError> {
        let picture = image::load_from_memory(bytes)
            .map_err(|e| RasterError::Malformed(format!("cannot decode image: {}", e)))?;

        let (page_w, page_h) = scaled_dimensions(A4_WIDTH_PT, A4_HEIGHT_PT);
        let mut canvas = RgbaImage::from_pixel(page_w, page_h, Rgba([255, 255, 255, 255]));

        let fitted = picture.resize(page_w, page_h, FilterType::Lanczos3).to_rgba8();
        let x = (page_w - fitted.width()) / 2;
        let y = (page_h - fitted.height()) / 2;
        image::imageops::overlay(&mut canvas, &fitted, i64::from(x), i64::from(y));

        let mut png = Vec::new();
        DynamicImage::ImageRgba8(canvas)
            .to_rgb8()
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;

        tracing::debug!(
            "Composed {}x{} image onto {}x{} A4 page",
            picture.width(),
            picture.height(),
            page_w,
            page_h
        );

        Ok(Self {
            page: PageImage {
                number: 1,
                width_pt: A4_WIDTH_PT,
                height_pt: A4_HEIGHT_PT,
                png,
            },
        })
    }
}

#[async_trait]
impl RasterSource for ImageSource {
    fn page_count(&self) -> u32 {
        1
    }

    async fn render_page(&self, page: u32) -> Result<PageImage, RasterError> {
        if page != 1 {
            return Err(RasterError::PageOutOfRange { page, total: 1 });
        }
        Ok(self.page.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn sample_png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([10, 20, 30]));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    #[tokio::test]
    async fn test_image_becomes_single_a4_page() {
        let source = ImageSource::compose(&sample_png(300, 100)).unwrap();
        assert_eq!(source.page_count(), 1);

        let page = source.render_page(1).await.unwrap();
        assert_eq!(page.number, 1);
        assert_eq!(page.width_pt, A4_WIDTH_PT);
        assert_eq!(page.height_pt, A4_HEIGHT_PT);

        let decoded = image::load_from_memory(&page.png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (1191, 1684));
    }

    #[test]
    fn test_image_is_centred_with_white_margins() {
        let source = ImageSource::compose(&sample_png(300, 100)).unwrap();
        let decoded = image::load_from_memory(&source.page.png).unwrap().to_rgb8();

        // Wide image: letterboxed top and bottom.
        assert_eq!(decoded.get_pixel(595, 5), &Rgb([255, 255, 255]));
        let centre = decoded.get_pixel(595, 842);
        assert!(centre.0.iter().all(|&channel| channel < 50));
    }

    #[tokio::test]
    async fn test_second_page_is_out_of_range() {
        let source = ImageSource::compose(&sample_png(10, 10)).unwrap();
        let err = source.render_page(2).await.unwrap_err();
        assert!(matches!(err, RasterError::PageOutOfRange { page: 2, total: 1 }));
    }

    #[test]
    fn test_garbage_is_malformed() {
        let err = ImageSource::compose(b"GIF89 nope").unwrap_err();
        assert!(matches!(err, RasterError::Malformed(_)));
    }
}
