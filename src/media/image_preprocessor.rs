use std::io;
use std::path::{Path, PathBuf};

use image::{DynamicImage, GenericImageView, Rgb, RgbImage};
use thiserror::Error;
use tracing::{debug, instrument};

use super::{Resolution, Rgb888Frame, Rgb888FrameError};

/// Errors returned when loading pattern images.
#[derive(Debug, Error)]
pub enum MediaError {
    /// The source file could not be read or decoded.
    #[error("failed to decode pattern image")]
    Decode(#[from] image::ImageError),
    /// A sequence directory could not be listed.
    #[error("failed to read sequence directory `{}`", path.display())]
    ReadDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The canvas failed RGB888 validation.
    #[error(transparent)]
    Frame(#[from] Rgb888FrameError),
}

/// Loads pattern bitmaps onto the device canvas.
pub struct ImageLoader;

impl ImageLoader {
    /// Decodes an image file into an RGB888 frame sized to the native canvas.
    ///
    /// Alpha is dropped. Images of any other size are pasted at the top-left
    /// corner of a black canvas; whatever lies past the canvas edge is cropped.
    ///
    /// # Errors
    ///
    /// Returns an error when decoding fails.
    #[instrument(skip_all, level = "debug", fields(path = %path.as_ref().display()))]
    pub fn load_png(path: impl AsRef<Path>) -> Result<Rgb888Frame, MediaError> {
        let decoded = image::open(path.as_ref())?;
        Self::place_on_canvas(&decoded, Resolution::NATIVE)
    }

    /// Decodes in-memory image bytes the same way as [`ImageLoader::load_png`].
    ///
    /// # Errors
    ///
    /// Returns an error when decoding fails.
    pub fn load_from_memory(bytes: &[u8]) -> Result<Rgb888Frame, MediaError> {
        let decoded = image::load_from_memory(bytes)?;
        Self::place_on_canvas(&decoded, Resolution::NATIVE)
    }

    /// Loads `sequence_0.png`, `sequence_1.png`, ... from `dir`.
    ///
    /// The number of frames equals the number of `.png` files in the
    /// directory, so every index below that count must exist.
    ///
    /// # Errors
    ///
    /// Returns an error when the directory cannot be listed or an indexed
    /// file is missing or fails to load.
    #[instrument(skip_all, level = "debug", fields(dir = %dir.as_ref().display()))]
    pub fn load_sequence_dir(dir: impl AsRef<Path>) -> Result<Vec<Rgb888Frame>, MediaError> {
        let dir = dir.as_ref();
        let png_count = Self::count_pngs(dir)?;
        debug!(png_count, "loading numbered sequence frames");
        (0..png_count)
            .map(|index| Self::load_png(dir.join(format!("sequence_{index}.png"))))
            .collect()
    }

    fn count_pngs(dir: &Path) -> Result<usize, MediaError> {
        let read_error = |source| MediaError::ReadDirectory {
            path: dir.to_path_buf(),
            source,
        };
        let mut count = 0;
        for entry in std::fs::read_dir(dir).map_err(read_error)? {
            let path = entry.map_err(read_error)?.path();
            let is_png = path
                .extension()
                .is_some_and(|extension| extension.eq_ignore_ascii_case("png"));
            if is_png {
                count += 1;
            }
        }
        Ok(count)
    }

    fn place_on_canvas(
        decoded: &DynamicImage,
        canvas: Resolution,
    ) -> Result<Rgb888Frame, MediaError> {
        let (width, height) = decoded.dimensions();
        let canvas_width = u32::from(canvas.width());
        let canvas_height = u32::from(canvas.height());

        let rgb = decoded.to_rgb8();
        let placed = if (width, height) == (canvas_width, canvas_height) {
            rgb
        } else {
            debug!(width, height, %canvas, "placing image on black canvas");
            // `replace` clips the source to the destination bounds.
            let mut background = RgbImage::from_pixel(canvas_width, canvas_height, Rgb([0, 0, 0]));
            image::imageops::replace(&mut background, &rgb, 0, 0);
            background
        };

        Ok(Rgb888Frame::try_from((canvas, placed.into_raw()))?)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use image::ImageEncoder;
    use pretty_assertions::assert_eq;

    use super::*;

    fn png_bytes(width: u32, height: u32, pixel: [u8; 4]) -> Vec<u8> {
        let mut bytes = Vec::new();
        let source = image::RgbaImage::from_pixel(width, height, image::Rgba(pixel));
        image::codecs::png::PngEncoder::new(&mut bytes)
            .write_image(source.as_raw(), width, height, image::ExtendedColorType::Rgba8)
            .expect("in-memory png encoding should succeed");
        bytes
    }

    #[test]
    fn small_image_is_pasted_top_left_without_alpha() {
        let bytes = png_bytes(2, 1, [0xAA, 0xBB, 0xCC, 0x40]);

        let frame = ImageLoader::load_from_memory(&bytes).expect("small png should load");

        assert_eq!(Resolution::NATIVE, frame.resolution());
        assert_eq!(1920 * 1080 * 3, frame.payload().len());
        assert_eq!(&[0xAA, 0xBB, 0xCC, 0xAA, 0xBB, 0xCC, 0x00], &frame.payload()[..7]);
        let second_row = 1920 * 3;
        assert_eq!(&[0x00, 0x00, 0x00], &frame.payload()[second_row..second_row + 3]);
    }

    #[test]
    fn oversized_image_is_cropped_to_canvas() {
        let mut source = image::RgbImage::from_pixel(1921, 1080, Rgb([0xFF, 0xFF, 0xFF]));
        for y in 0..1080 {
            source.put_pixel(1920, y, Rgb([0x12, 0x34, 0x56]));
        }
        let mut bytes = Vec::new();
        image::codecs::png::PngEncoder::new(&mut bytes)
            .write_image(source.as_raw(), 1921, 1080, image::ExtendedColorType::Rgb8)
            .expect("in-memory png encoding should succeed");

        let frame = ImageLoader::load_from_memory(&bytes).expect("oversized png should load");

        assert_eq!(Resolution::NATIVE, frame.resolution());
        assert_eq!(1920 * 1080 * 3, frame.payload().len());
        assert!(frame.payload().iter().all(|channel| *channel == 0xFF));
    }

    #[test]
    fn sequence_dir_loads_frames_in_index_order() -> anyhow::Result<()> {
        let dir = std::env::temp_dir().join(format!("dlpc-sequence-{}", std::process::id()));
        std::fs::create_dir_all(&dir)?;
        std::fs::write(dir.join("sequence_1.png"), png_bytes(1, 1, [0x22, 0x22, 0x22, 0xFF]))?;
        std::fs::write(dir.join("sequence_0.png"), png_bytes(1, 1, [0x11, 0x11, 0x11, 0xFF]))?;
        std::fs::write(dir.join("notes.txt"), b"ignored")?;

        let frames = ImageLoader::load_sequence_dir(&dir)?;
        std::fs::remove_dir_all(&dir)?;

        let first_pixels: Vec<u8> = frames.iter().map(|frame| frame.payload()[0]).collect();
        assert_eq!(vec![0x11, 0x22], first_pixels);
        Ok(())
    }

    #[test]
    fn missing_sequence_dir_is_reported() {
        let result = ImageLoader::load_sequence_dir("/nonexistent/dlpc-sequence");

        assert_matches!(result, Err(MediaError::ReadDirectory { .. }));
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let result = ImageLoader::load_from_memory(&[0x00, 0x01, 0x02]);

        assert_matches!(result, Err(MediaError::Decode(_)));
    }
}
