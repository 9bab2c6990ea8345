use glam::{EulerRot, Quat, Vec3};

/// World-space position and orientation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Pose {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    pub const fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }
}

/// Euler angles in degrees, applied Z then X then Y (the convention the
/// lane grid and chart rotations are authored in).
#[inline(always)]
pub fn quat_from_euler_degrees(degrees: Vec3) -> Quat {
    Quat::from_euler(
        EulerRot::YXZ,
        degrees.y.to_radians(),
        degrees.x.to_radians(),
        degrees.z.to_radians(),
    )
}

/// Constant-speed step from `current` towards `target`, never overshooting.
#[inline(always)]
pub fn move_towards(current: Vec3, target: Vec3, max_delta: f32) -> Vec3 {
    let to_target = target - current;
    let distance = to_target.length();
    if distance <= max_delta || distance <= f32::EPSILON {
        return target;
    }
    current + to_target / distance * max_delta
}

/// Axis-aligned box used as a note's collision volume.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub center: Vec3,
    pub half_extents: Vec3,
}

impl Aabb {
    pub const fn new(center: Vec3, half_extents: Vec3) -> Self {
        Self {
            center,
            half_extents,
        }
    }

    pub fn cube(center: Vec3, half_extent: f32) -> Self {
        Self::new(center, Vec3::splat(half_extent))
    }

    /// Whether a sphere of `radius` at `point` touches this box.
    pub fn touches_sphere(&self, point: Vec3, radius: f32) -> bool {
        let closest = point.clamp(
            self.center - self.half_extents,
            self.center + self.half_extents,
        );
        closest.distance_squared(point) <= radius * radius
    }
}

/// Swept test between a sphere of `radius` travelling from `start` to `end`
/// and a box that itself moved by `box_motion` over the same interval.
///
/// Works in the box's frame: the sphere's path relative to the box is a
/// segment, which is tested against the box grown by the radius (slab test).
pub fn swept_sphere_hits_box(
    start: Vec3,
    end: Vec3,
    radius: f32,
    volume: &Aabb,
    box_motion: Vec3,
) -> bool {
    let box_start = volume.center - box_motion;
    let rel_start = start - box_start;
    let rel_end = end - volume.center;
    segment_hits_centered_box(rel_start, rel_end, volume.half_extents + Vec3::splat(radius))
}

fn segment_hits_centered_box(a: Vec3, b: Vec3, half: Vec3) -> bool {
    let dir = b - a;
    let mut t_min = 0.0_f32;
    let mut t_max = 1.0_f32;

    for axis in 0..3 {
        let origin = a[axis];
        let d = dir[axis];
        let (lo, hi) = (-half[axis], half[axis]);
        if d.abs() <= f32::EPSILON {
            if origin < lo || origin > hi {
                return false;
            }
            continue;
        }
        let inv = 1.0 / d;
        let mut t0 = (lo - origin) * inv;
        let mut t1 = (hi - origin) * inv;
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
        }
        t_min = t_min.max(t0);
        t_max = t_max.min(t1);
        if t_min > t_max {
            return false;
        }
    }
    true
}
