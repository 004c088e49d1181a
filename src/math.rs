// Impl's organized in order:
// -struct declaration
// -impl
// -conversions
// -indexing
// -add, addassign
// -sub, subassign
// -mul, mulassign
// -div, divassign
// -angle helpers

use std::f64::consts::PI;

/// Single precision 3D vector, the form positions take once they leave the hub
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SVec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32
}

impl SVec3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub const fn zero() -> Self {
        Self { x: 0.0, y: 0.0, z: 0.0 }
    }

    pub fn to_array(&self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }
}

impl std::convert::From<DVec3> for SVec3 {
    fn from(dvec: DVec3) -> Self {
        Self { x: dvec.x as f32, y: dvec.y as f32, z: dvec.z as f32 }
    }
}

impl std::convert::From<&DVec3> for SVec3 {
    fn from(dvec: &DVec3) -> Self {
        Self { x: dvec.x as f32, y: dvec.y as f32, z: dvec.z as f32 }
    }
}

/// Double precision 3D vector, used for every position, orientation and delta inside the hub
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DVec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64
}

impl DVec3 {
    pub const fn new(x: f64, y: f64, z: f64) -> DVec3 {
        DVec3 { x, y, z }
    }

    pub const fn zero() -> DVec3 {
        DVec3 { x: 0.0, y: 0.0, z: 0.0 }
    }

    pub fn dot(&self, rhs: &Self) -> f64 {
        self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }

    pub fn length_to(&self, rhs: &Self) -> f64 {
        (self - rhs).magnitude()
    }

    pub fn magnitude(&self) -> f64 {
        self.dot(self).sqrt()
    }

    /// Returns the unit vector, or zero for a zero-length input
    pub fn normalize(&self) -> Self {
        let m = self.magnitude();
        if m > 0.0 {
            *self / m
        } else {
            DVec3::zero()
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Rescales the vector so its magnitude is at most `max`
    pub fn clamp_magnitude(&self, max: f64) -> Self {
        let m = self.magnitude();
        if m > max && m > 0.0 {
            *self * (max / m)
        } else {
            *self
        }
    }

    // rotations follow the right hand rule about each axis

    pub fn rotate_x(&self, angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        DVec3 { x: self.x, y: self.y * c - self.z * s, z: self.y * s + self.z * c }
    }

    pub fn rotate_y(&self, angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        DVec3 { x: self.x * c + self.z * s, y: self.y, z: -self.x * s + self.z * c }
    }

    pub fn rotate_z(&self, angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        DVec3 { x: self.x * c - self.y * s, y: self.x * s + self.y * c, z: self.z }
    }

    /// Rotates around `pivot` rather than the origin
    pub fn rotate_about(&self, pivot: &DVec3, yaw: f64, pitch: f64, roll: f64) -> Self {
        let relative = self - pivot;
        relative.rotate_z(yaw).rotate_x(pitch).rotate_y(roll) + *pivot
    }
}

impl std::convert::From<SVec3> for DVec3 {
    fn from(svec: SVec3) -> Self {
        Self { x: svec.x as f64, y: svec.y as f64, z: svec.z as f64 }
    }
}

impl std::convert::From<(f64, f64, f64)> for DVec3 {
    fn from(tuple: (f64, f64, f64)) -> DVec3 {
        DVec3 { x: tuple.0, y: tuple.1, z: tuple.2 }
    }
}

impl std::convert::From<[f64; 3]> for DVec3 {
    fn from(array: [f64; 3]) -> DVec3 {
        DVec3 { x: array[0], y: array[1], z: array[2] }
    }
}

impl std::ops::Add for DVec3 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self { x: self.x + rhs.x, y: self.y + rhs.y, z: self.z + rhs.z }
    }
}

impl std::ops::AddAssign for DVec3 {
    fn add_assign(&mut self, rhs: Self) {
        *self = Self { x: self.x + rhs.x, y: self.y + rhs.y, z: self.z + rhs.z }
    }
}

impl std::ops::Sub for DVec3 {
    type Output = DVec3;
    fn sub(self, rhs: Self) -> Self {
        DVec3 { x: self.x - rhs.x, y: self.y - rhs.y, z: self.z - rhs.z }
    }
}

impl<'a, 'b> std::ops::Sub<&'b DVec3> for &'a DVec3 {
    type Output = DVec3;
    fn sub(self, rhs: &'b DVec3) -> DVec3 {
        DVec3 { x: self.x - rhs.x, y: self.y - rhs.y, z: self.z - rhs.z }
    }
}

impl std::ops::Neg for DVec3 {
    type Output = DVec3;
    fn neg(self) -> DVec3 {
        DVec3 { x: -self.x, y: -self.y, z: -self.z }
    }
}

impl std::ops::Mul<f64> for DVec3 {
    type Output = Self;
    fn mul(self, rhs: f64) -> Self::Output {
        Self::Output { x: self.x * rhs, y: self.y * rhs, z: self.z * rhs }
    }
}

impl std::ops::Mul<DVec3> for f64 {
    type Output = DVec3;
    fn mul(self, rhs: DVec3) -> DVec3 {
        DVec3 { x: self * rhs.x, y: self * rhs.y, z: self * rhs.z }
    }
}

impl std::ops::Div<f64> for DVec3 {
    type Output = Self;
    fn div(self, rhs: f64) -> Self {
        Self { x: self.x / rhs, y: self.y / rhs, z: self.z / rhs }
    }
}

/// Wraps an angle in radians into [-pi, pi]
pub fn wrap_angle(angle: f64) -> f64 {
    (angle + PI).rem_euclid(2.0 * PI) - PI
}

/// Wraps each component of a (yaw, pitch, roll) triple
pub fn wrap_angles(angles: DVec3) -> DVec3 {
    DVec3::new(wrap_angle(angles.x), wrap_angle(angles.y), wrap_angle(angles.z))
}

/// Wraps a normalized phase into [0, 1)
pub fn wrap_phase(phase: f64) -> f64 {
    let wrapped = phase.rem_euclid(1.0);
    // rem_euclid lands exactly on 1.0 for tiny negative inputs
    if wrapped >= 1.0 { 0.0 } else { wrapped }
}

/// Smallest signed difference `to - from`, in [-pi, pi]
pub fn angle_diff(from: f64, to: f64) -> f64 {
    wrap_angle(to - from)
}
