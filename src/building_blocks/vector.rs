use std::fmt;
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub};

use crate::error::{BeamformError, Result};

/// below this squared magnitude a vector counts as zero
pub const ZERO_VECTOR_EPSILON: f32 = 0.00001;

/**
 * a plain 3d vector, used for microphone and attention positions
 * (millimeters) as well as focus points (meters)
 */
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    pub const ZERO: Vector3 = Vector3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Vector3 { x, y, z }
    }

    pub fn dot(&self, other: Vector3) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(&self, other: Vector3) -> Vector3 {
        Vector3 {
            x: self.y * other.z - self.z * other.y,
            y: self.z * other.x - self.x * other.z,
            z: self.x * other.y - self.y * other.x,
        }
    }

    pub fn squared_magnitude(&self) -> f32 {
        self.dot(*self)
    }

    pub fn magnitude(&self) -> f32 {
        self.squared_magnitude().sqrt()
    }

    pub fn distance(&self, other: Vector3) -> f32 {
        (*self - other).magnitude()
    }

    pub fn is_zero(&self) -> bool {
        self.squared_magnitude() < ZERO_VECTOR_EPSILON
    }

    /// unit vector in the same direction, fails on (near) zero vectors
    /// instead of producing NaNs
    pub fn normalized(&self, what: &'static str) -> Result<Vector3> {
        if self.is_zero() {
            return Err(BeamformError::ZeroVector(what));
        }
        Ok(*self / self.magnitude())
    }

    /// same direction, given length
    pub fn of_length(&self, length: f32, what: &'static str) -> Result<Vector3> {
        Ok(self.normalized(what)? * length)
    }

    /// angle in radians, both vectors must already be unit length
    pub fn angle_between_unit_vectors(&self, other: Vector3) -> f32 {
        // rounding can push the dot product slightly outside of [-1, 1]
        self.dot(other).clamp(-1.0, 1.0).acos()
    }

    /// angle in radians between two arbitrary non-zero vectors
    pub fn angle_between(&self, other: Vector3, what: &'static str) -> Result<f32> {
        let a = self.normalized(what)?;
        let b = other.normalized(what)?;
        Ok(a.angle_between_unit_vectors(b))
    }

    /// Rodrigues rotation of this vector around a unit-length axis.
    pub fn rotate_around_axis(&self, unit_axis: Vector3, angle_radians: f32) -> Vector3 {
        let (sin, cos) = angle_radians.sin_cos();
        *self * cos + unit_axis.cross(*self) * sin + unit_axis * (unit_axis.dot(*self) * (1.0 - cos))
    }
}

impl Add for Vector3 {
    type Output = Vector3;

    fn add(self, rhs: Vector3) -> Vector3 {
        Vector3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Vector3 {
    fn add_assign(&mut self, rhs: Vector3) {
        self.x += rhs.x;
        self.y += rhs.y;
        self.z += rhs.z;
    }
}

impl Sub for Vector3 {
    type Output = Vector3;

    fn sub(self, rhs: Vector3) -> Vector3 {
        Vector3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Neg for Vector3 {
    type Output = Vector3;

    fn neg(self) -> Vector3 {
        Vector3::new(-self.x, -self.y, -self.z)
    }
}

impl Mul<f32> for Vector3 {
    type Output = Vector3;

    fn mul(self, rhs: f32) -> Vector3 {
        Vector3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Div<f32> for Vector3 {
    type Output = Vector3;

    fn div(self, rhs: f32) -> Vector3 {
        Vector3::new(self.x / rhs, self.y / rhs, self.z / rhs)
    }
}

impl fmt::Display for Vector3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2}, {:.2}, {:.2})", self.x, self.y, self.z)
    }
}
