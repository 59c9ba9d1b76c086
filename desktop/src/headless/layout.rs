use perch_geometry::{Point, Rect, Size};
use perch_scene::OutputId;

/// Outputs placed left to right in layout coordinates.
#[derive(Debug, Default)]
pub struct OutputLayout {
    outputs: Vec<(OutputId, Rect)>,
}

impl OutputLayout {
    /// Place the output right of all outputs in the layout. Adding an output twice keeps its
    /// area.
    pub fn add_auto(&mut self, output: OutputId, size: Size) -> Rect {
        if let Some(area) = self.area(output) {
            return area;
        }
        let left = self.bounds().right;
        let area = Rect::new((left, 0.0), size);
        self.outputs.push((output, area));
        area
    }

    pub fn remove(&mut self, output: OutputId) {
        self.outputs.retain(|(o, _)| *o != output);
    }

    pub fn area(&self, output: OutputId) -> Option<Rect> {
        self.outputs
            .iter()
            .find(|(o, _)| *o == output)
            .map(|(_, area)| *area)
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    /// The extents of all outputs. Empty without outputs.
    pub fn bounds(&self) -> Rect {
        self.outputs
            .iter()
            .map(|(_, area)| *area)
            .reduce(|a, b| a.joined(b))
            .unwrap_or(Rect::ZERO)
    }

    /// The position on an output closest to `p`. `p` itself without outputs.
    pub fn closest_point(&self, p: Point) -> Point {
        self.outputs
            .iter()
            .map(|(_, area)| area.closest_point(p))
            .min_by(|a, b| {
                a.squared_distance(p)
                    .total_cmp(&b.squared_distance(p))
            })
            .unwrap_or(p)
    }
}
