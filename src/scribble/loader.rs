//! Base-image fetching collaborators.

use anyhow::{anyhow, Context};
use image::imageops::FilterType;
use image::RgbaImage;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Opaque reference to the base image. Byte sources decide what it means.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageRef(pub String);

impl ImageRef {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ImageRef {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetSize {
    Original,
    /// Fit within the box, keeping aspect ratio. Never upscales.
    Bounded { width: u32, height: u32 },
}

impl TargetSize {
    pub fn fits(self, width: u32, height: u32) -> bool {
        match self {
            TargetSize::Original => true,
            TargetSize::Bounded {
                width: max_w,
                height: max_h,
            } => width <= max_w && height <= max_h,
        }
    }
}

pub trait ImageLoader: Send + Sync {
    fn load(
        &self,
        image: &ImageRef,
        target: TargetSize,
        skip_cache: bool,
    ) -> anyhow::Result<RgbaImage>;
}

/// Produces the raw (encoded) bytes for an image reference, decrypting them
/// when the backing store is encrypted.
pub trait ByteSource: Send + Sync {
    fn read(&self, image: &ImageRef) -> anyhow::Result<Vec<u8>>;
}

/// Reads plain files; the image reference is a path, optionally relative to
/// `root`.
#[derive(Debug, Clone, Default)]
pub struct FileByteSource {
    root: Option<PathBuf>,
}

impl FileByteSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, image: &ImageRef) -> PathBuf {
        match &self.root {
            Some(root) => root.join(image.as_str()),
            None => PathBuf::from(image.as_str()),
        }
    }
}

impl ByteSource for FileByteSource {
    fn read(&self, image: &ImageRef) -> anyhow::Result<Vec<u8>> {
        let path = self.resolve(image);
        std::fs::read(&path).with_context(|| format!("reading image {}", path.display()))
    }
}

/// Decodes bytes from any [`ByteSource`] and fits them to the target size.
/// Decoded originals are cached per reference unless the caller asks to skip
/// the cache.
pub struct DecodingImageLoader<S> {
    source: S,
    cache: Mutex<HashMap<ImageRef, Arc<RgbaImage>>>,
}

impl<S: ByteSource> DecodingImageLoader<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn cached_len(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }

    fn decode(&self, image: &ImageRef) -> anyhow::Result<RgbaImage> {
        let bytes = self.source.read(image)?;
        let decoded = image::load_from_memory(&bytes)
            .with_context(|| format!("decoding image {}", image.as_str()))?;
        Ok(decoded.to_rgba8())
    }

    fn original(&self, image: &ImageRef, skip_cache: bool) -> anyhow::Result<Arc<RgbaImage>> {
        if skip_cache {
            return self.decode(image).map(Arc::new);
        }
        {
            let cache = self
                .cache
                .lock()
                .map_err(|_| anyhow!("image cache lock poisoned"))?;
            if let Some(hit) = cache.get(image) {
                return Ok(Arc::clone(hit));
            }
        }
        let decoded = Arc::new(self.decode(image)?);
        self.cache
            .lock()
            .map_err(|_| anyhow!("image cache lock poisoned"))?
            .insert(image.clone(), Arc::clone(&decoded));
        Ok(decoded)
    }
}

impl<S: ByteSource> ImageLoader for DecodingImageLoader<S> {
    fn load(
        &self,
        image: &ImageRef,
        target: TargetSize,
        skip_cache: bool,
    ) -> anyhow::Result<RgbaImage> {
        let original = self.original(image, skip_cache)?;
        Ok(fit_within(&original, target))
    }
}

/// Downscales `bitmap` to fit `target`, preserving aspect ratio.
pub fn fit_within(bitmap: &RgbaImage, target: TargetSize) -> RgbaImage {
    let (width, height) = bitmap.dimensions();
    match target {
        TargetSize::Bounded {
            width: max_w,
            height: max_h,
        } if !target.fits(width, height) && max_w > 0 && max_h > 0 => {
            let ratio = (max_w as f32 / width as f32).min(max_h as f32 / height as f32);
            let new_w = ((width as f32 * ratio).floor() as u32).clamp(1, max_w);
            let new_h = ((height as f32 * ratio).floor() as u32).clamp(1, max_h);
            image::imageops::resize(bitmap, new_w, new_h, FilterType::Triangle)
        }
        _ => bitmap.clone(),
    }
}

pub trait MemoryPressure: Send + Sync {
    fn is_low_memory(&self) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FixedMemoryPressure(pub bool);

impl MemoryPressure for FixedMemoryPressure {
    fn is_low_memory(&self) -> bool {
        self.0
    }
}
