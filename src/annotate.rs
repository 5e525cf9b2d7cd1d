use std::io::Cursor;

use ab_glyph::{FontRef, PxScale};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{codecs::jpeg::JpegEncoder, DynamicImage, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use thiserror::Error;

use crate::labels::ClassLabels;
use crate::model_service::BoundingBox;

const FONT_BYTES: &[u8] = include_bytes!("../assets/DejaVuSans-Bold.ttf");

const LABEL_TEXT_HEIGHT: f32 = 16.0;
const BOX_THICKNESS: i32 = 2;

const PALETTE: [Rgb<u8>; 10] = [
    Rgb([230, 57, 70]),
    Rgb([29, 53, 87]),
    Rgb([42, 157, 143]),
    Rgb([233, 196, 106]),
    Rgb([244, 162, 97]),
    Rgb([38, 70, 83]),
    Rgb([231, 111, 81]),
    Rgb([69, 123, 157]),
    Rgb([106, 76, 147]),
    Rgb([82, 183, 136]),
];

#[derive(Error, Debug)]
pub enum AnnotateError {
    #[error("Failed to load embedded font: {0}")]
    FontLoadFailed(#[from] ab_glyph::InvalidFont),
    #[error("Failed to encode frame: {0}")]
    EncodeFrameFailed(#[from] image::ImageError),
}

pub struct Annotator {
    font: FontRef<'static>,
    jpeg_quality: u8,
}

impl Annotator {
    pub fn new(jpeg_quality: u8) -> Result<Self, AnnotateError> {
        let font = FontRef::try_from_slice(FONT_BYTES)?;
        Ok(Self { font, jpeg_quality })
    }

    /// Draw detection overlays on a copy of the input image. An empty box
    /// list yields an unmarked copy with identical dimensions.
    pub fn annotate(
        &self,
        image: &DynamicImage,
        boxes: &[BoundingBox],
        labels: &ClassLabels,
    ) -> RgbImage {
        let mut canvas = image.to_rgb8();
        let (width, height) = canvas.dimensions();

        for bbox in boxes {
            let color = PALETTE[bbox.class_id % PALETTE.len()];
            let x1 = (bbox.x1 as i32).clamp(0, width as i32 - 1);
            let y1 = (bbox.y1 as i32).clamp(0, height as i32 - 1);
            let x2 = (bbox.x2 as i32).clamp(0, width as i32 - 1);
            let y2 = (bbox.y2 as i32).clamp(0, height as i32 - 1);
            let box_width = (x2 - x1).max(1) as u32;
            let box_height = (y2 - y1).max(1) as u32;

            for inset in 0..BOX_THICKNESS {
                let rect = Rect::at(x1 + inset, y1 + inset).of_size(
                    box_width.saturating_sub(2 * inset as u32).max(1),
                    box_height.saturating_sub(2 * inset as u32).max(1),
                );
                draw_hollow_rect_mut(&mut canvas, rect, color);
            }

            let label = format!("{}: {:.2}", labels.name(bbox.class_id), bbox.confidence);
            let scale = PxScale::from(LABEL_TEXT_HEIGHT);
            let (text_width, text_height) = text_size(scale, &self.font, &label);

            // label strip above the box, inside it when clipped at the top
            let strip_height = text_height + 4;
            let strip_y = if y1 >= strip_height as i32 {
                y1 - strip_height as i32
            } else {
                y1
            };
            let strip = Rect::at(x1, strip_y).of_size(text_width + 4, strip_height);
            draw_filled_rect_mut(&mut canvas, strip, color);
            draw_text_mut(
                &mut canvas,
                Rgb([255, 255, 255]),
                x1 + 2,
                strip_y + 2,
                scale,
                &self.font,
                &label,
            );
        }

        canvas
    }

    pub fn to_jpeg(&self, image: &RgbImage) -> Result<Vec<u8>, AnnotateError> {
        let mut buffer = Cursor::new(Vec::new());
        let encoder = JpegEncoder::new_with_quality(&mut buffer, self.jpeg_quality);
        image.write_with_encoder(encoder)?;
        Ok(buffer.into_inner())
    }

    pub fn to_base64_jpeg(&self, image: &RgbImage) -> Result<String, AnnotateError> {
        Ok(STANDARD.encode(self.to_jpeg(image)?))
    }
}
