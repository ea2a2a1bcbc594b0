use std::f64::consts::TAU;

/// Flattened polylines of a domain: boundary, holes and cracks
pub struct DomainInput {
    pub boundary: Vec<f64>,
    pub holes: Vec<Vec<f64>>,
    pub cracks: Vec<Vec<f64>>,
}

pub fn square(side: f64) -> DomainInput {
    DomainInput {
        boundary: vec![0., 0., side, 0., side, side, 0., side],
        holes: Vec::new(),
        cracks: Vec::new(),
    }
}

/// Regular polygon approximating a circle of `radius` centered on `(cx, cy)`
pub fn circle(cx: f64, cy: f64, radius: f64, segments: usize, clockwise: bool) -> Vec<f64> {
    let mut polyline = Vec::with_capacity(2 * segments);
    for i in 0..segments {
        let mut angle = TAU * i as f64 / segments as f64;
        if clockwise {
            angle = -angle;
        }
        polyline.push(cx + radius * angle.cos());
        polyline.push(cy + radius * angle.sin());
    }
    polyline
}

/// Square plate of side `side` pierced by a `holes_per_side`² array of circular holes, with a zigzag crack
/// between the first holes. `holes_per_side` must be at least 2.
pub fn perforated_plate(side: f64, holes_per_side: usize) -> DomainInput {
    let pitch = side / holes_per_side as f64;
    let mut holes = Vec::new();
    for i in 0..holes_per_side {
        for j in 0..holes_per_side {
            let cx = (i as f64 + 0.5) * pitch;
            let cy = (j as f64 + 0.5) * pitch;
            holes.push(circle(cx, cy, 0.25 * pitch, 16, true));
        }
    }
    let crack = vec![
        0.8 * pitch,
        pitch,
        pitch,
        1.1 * pitch,
        1.2 * pitch,
        pitch,
    ];
    DomainInput {
        boundary: vec![0., 0., side, 0., side, side, 0., side],
        holes,
        cracks: vec![crack],
    }
}
