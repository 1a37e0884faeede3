use crate::models::importance::SegmentMap;

/// Superpixel segmentation capability.
///
/// Implementations receive the source image bytes and the spatial extent of the
/// importance map the labels must line up with.
pub trait Segmenter: Send + Sync {
    fn segment(&self, image: &[u8], height: usize, width: usize)
        -> Result<SegmentMap, SegmentError>;
}

/// Partitions the map into an `n × n` grid of near-equal rectangular blocks.
/// Content-independent; labels are assigned row-major.
pub struct GridSegmenter {
    cells: usize,
}

impl GridSegmenter {
    pub fn new(cells: usize) -> Result<Self, SegmentError> {
        if cells == 0 {
            return Err(SegmentError::Config("grid needs at least one cell".to_string()));
        }
        Ok(Self { cells })
    }
}

impl Segmenter for GridSegmenter {
    fn segment(
        &self,
        _image: &[u8],
        height: usize,
        width: usize,
    ) -> Result<SegmentMap, SegmentError> {
        // Never more cells than pixels along an axis.
        let rows = self.cells.min(height).max(1);
        let cols = self.cells.min(width).max(1);

        let mut labels = Vec::with_capacity(height * width);
        for y in 0..height {
            let cell_row = y * rows / height;
            for x in 0..width {
                let cell_col = x * cols / width;
                labels.push((cell_row * cols + cell_col) as u32);
            }
        }

        SegmentMap::new(height, width, labels).map_err(|e| SegmentError::Failed(e.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SegmentError {
    #[error("Segmentation configuration error: {0}")]
    Config(String),

    #[error("Segmentation failed: {0}")]
    Failed(String),
}
