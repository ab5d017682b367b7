use crate::building_blocks::Vector3;
use crate::error::{BeamformError, Result};
use crate::helpers::units::{degrees_to_radians, radians_to_degrees};

/// tolerance so that exact divisions like "90 degrees in steps of 10"
/// don't lose their last point to rounding
const GRANULARITY_EPSILON_RADIANS: f32 = 0.001;

/**
 * A set of points (in millimeters, relative to the array origin) that an
 * array microphone may want to listen to. Intentionally decoupled from
 * the array geometry, since the same array can be used with different
 * listening patterns or different granularities of the same pattern.
 */
#[derive(Clone, Debug, Default)]
pub struct AttentionPattern {
    positions: Vec<Vector3>,
}

impl AttentionPattern {
    /// Any points are accepted here, but a beamformer can't be built
    /// around a point that sits exactly on the midpoint of one of its
    /// mic pairs, since that point has no direction.
    pub fn new(positions: Vec<Vector3>) -> Self {
        AttentionPattern { positions }
    }

    pub fn positions(&self) -> &[Vector3] {
        &self.positions
    }

    pub fn num_elements(&self) -> usize {
        self.positions.len()
    }

    /// A horizontal arc of `wideness_degrees` centered on `forward`,
    /// pivoting around `up`.
    pub fn semi_circle(
        origin: Vector3,
        forward: Vector3,
        up: Vector3,
        radius: f32,
        wideness_degrees: f32,
        granularity_degrees: f32,
    ) -> Result<Self> {
        let (forward, up) = check_axes(forward, up)?;
        if wideness_degrees <= 0.0 || wideness_degrees > 360.0 {
            return Err(BeamformError::out_of_range(format!(
                "wideness must be in (0, 360] degrees, got {}",
                wideness_degrees
            )));
        }
        if radius <= 0.0 {
            return Err(BeamformError::out_of_range(format!(
                "radius must be positive, got {}",
                radius
            )));
        }
        check_granularity("granularity", granularity_degrees, wideness_degrees)?;

        let mut positions = Vec::new();
        append_circular_points(
            &mut positions,
            origin,
            forward,
            up,
            radius,
            degrees_to_radians(wideness_degrees),
            degrees_to_radians(granularity_degrees),
        );

        Ok(AttentionPattern { positions })
    }

    /// A full horizontal ring, `forward` only decides where the first point sits.
    pub fn circle(
        origin: Vector3,
        forward: Vector3,
        up: Vector3,
        radius: f32,
        granularity_degrees: f32,
    ) -> Result<Self> {
        Self::semi_circle(origin, forward, up, radius, 360.0, granularity_degrees)
    }

    /// A rectangular patch of a sphere, made of stacked horizontal rings.
    /// The horizontal spacing widens away from the equator so points
    /// don't bunch up towards the poles.
    #[allow(clippy::too_many_arguments)]
    pub fn semi_sphere(
        origin: Vector3,
        forward: Vector3,
        up: Vector3,
        radius: f32,
        horizontal_wideness_degrees: f32,
        vertical_wideness_degrees: f32,
        horizontal_granularity_degrees: f32,
        vertical_granularity_degrees: f32,
    ) -> Result<Self> {
        let (forward, up) = check_axes(forward, up)?;
        if radius <= 0.0 {
            return Err(BeamformError::out_of_range(format!(
                "radius must be positive, got {}",
                radius
            )));
        }
        if horizontal_wideness_degrees <= 0.0 || horizontal_wideness_degrees > 361.0 {
            return Err(BeamformError::out_of_range(format!(
                "horizontal wideness must be in (0, 361] degrees, got {}",
                horizontal_wideness_degrees
            )));
        }
        if vertical_wideness_degrees <= 0.0 || vertical_wideness_degrees > 181.0 {
            return Err(BeamformError::out_of_range(format!(
                "vertical wideness must be in (0, 181] degrees, got {}",
                vertical_wideness_degrees
            )));
        }
        check_granularity(
            "horizontal granularity",
            horizontal_granularity_degrees,
            horizontal_wideness_degrees,
        )?;
        check_granularity(
            "vertical granularity",
            vertical_granularity_degrees,
            vertical_wideness_degrees,
        )?;

        let h_granularity = degrees_to_radians(horizontal_granularity_degrees);
        let h_wideness = degrees_to_radians(horizontal_wideness_degrees);
        let v_granularity = degrees_to_radians(vertical_granularity_degrees);
        let v_wideness = degrees_to_radians(vertical_wideness_degrees);

        let num_layers = ((v_wideness + GRANULARITY_EPSILON_RADIANS) / v_granularity).floor() as usize;

        // phi is the elevation, 0 is the horizontal plane
        let mut phi = -(((num_layers as f32 / 2.0) - 0.5) * v_granularity);
        let mut positions = Vec::new();

        for _ in 0..num_layers {
            let layer_radius_fraction = phi.cos();
            let layer_vertical_fraction = phi.sin();
            let layer_origin = origin + up * (layer_vertical_fraction * radius);

            // rings at (or numerically past) the poles have no circumference left
            if layer_radius_fraction > f32::EPSILON {
                append_circular_points(
                    &mut positions,
                    layer_origin,
                    forward,
                    up,
                    radius * layer_radius_fraction,
                    h_wideness,
                    h_granularity / layer_radius_fraction,
                );
            }
            phi += v_granularity;
        }

        Ok(AttentionPattern { positions })
    }

    /// A sphere with the top and bottom chopped off.
    pub fn torus(
        origin: Vector3,
        forward: Vector3,
        up: Vector3,
        radius: f32,
        vertical_wideness_degrees: f32,
        horizontal_granularity_degrees: f32,
        vertical_granularity_degrees: f32,
    ) -> Result<Self> {
        Self::semi_sphere(
            origin,
            forward,
            up,
            radius,
            360.0,
            vertical_wideness_degrees,
            horizontal_granularity_degrees,
            vertical_granularity_degrees,
        )
    }

    pub fn sphere(
        origin: Vector3,
        forward: Vector3,
        up: Vector3,
        radius: f32,
        horizontal_granularity_degrees: f32,
        vertical_granularity_degrees: f32,
    ) -> Result<Self> {
        Self::semi_sphere(
            origin,
            forward,
            up,
            radius,
            360.0,
            180.0,
            horizontal_granularity_degrees,
            vertical_granularity_degrees,
        )
    }
}

fn check_granularity(what: &str, granularity: f32, wideness: f32) -> Result<()> {
    if granularity <= 0.0 || granularity > wideness {
        return Err(BeamformError::out_of_range(format!(
            "{} must be in (0, {}] degrees, got {}",
            what, wideness, granularity
        )));
    }
    Ok(())
}

/// normalizes both axes and makes sure they are perpendicular within a degree
fn check_axes(forward: Vector3, up: Vector3) -> Result<(Vector3, Vector3)> {
    let forward = forward.normalized("forward vector")?;
    let up = up.normalized("up vector")?;

    let perpendicularity = radians_to_degrees(forward.angle_between_unit_vectors(up));
    if !(89.0..=91.0).contains(&perpendicularity) {
        return Err(BeamformError::out_of_range(format!(
            "forward and up vectors must be perpendicular, actual angle: {} degrees",
            perpendicularity
        )));
    }

    Ok((forward, up))
}

fn append_circular_points(
    output: &mut Vec<Vector3>,
    origin: Vector3,
    forward: Vector3,
    up: Vector3,
    radius: f32,
    wideness_radians: f32,
    granularity_radians: f32,
) {
    let num_points = ((wideness_radians + GRANULARITY_EPSILON_RADIANS) / granularity_radians).floor() as usize;
    let mut theta = -(((num_points as f32 / 2.0) - 0.5) * granularity_radians);

    for _ in 0..num_points {
        output.push(origin + forward.rotate_around_axis(up, theta) * radius);
        theta += granularity_radians;
    }
}
