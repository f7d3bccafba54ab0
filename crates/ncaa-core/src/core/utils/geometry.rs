use nalgebra::{Matrix3, Point3, Rotation3, Vector3};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AlignmentError {
    #[error("Cannot superpose {mobile} mobile points onto {reference} reference points")]
    LengthMismatch { mobile: usize, reference: usize },
    #[error("Cannot superpose an empty point set")]
    Empty,
    #[error("Singular value decomposition failed")]
    Decomposition,
}

/// A proper rigid-body motion: rotate about the origin, then translate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidTransform {
    pub rotation: Rotation3<f64>,
    pub translation: Vector3<f64>,
}

impl RigidTransform {
    pub fn identity() -> Self {
        Self {
            rotation: Rotation3::identity(),
            translation: Vector3::zeros(),
        }
    }

    #[inline]
    pub fn apply(&self, point: &Point3<f64>) -> Point3<f64> {
        self.rotation * point + self.translation
    }
}

fn centroid(points: &[Point3<f64>]) -> Point3<f64> {
    let sum: Vector3<f64> = points.iter().map(|p| p.coords).sum();
    Point3::from(sum / points.len() as f64)
}

/// Finds the rigid transform that best maps `mobile` onto `reference` in the least-squares
/// sense (Kabsch). Reflections are corrected so the result is always a proper rotation.
///
/// One point pair gives a pure translation; two pairs align the connecting vectors.
pub fn superpose(
    mobile: &[Point3<f64>],
    reference: &[Point3<f64>],
) -> Result<RigidTransform, AlignmentError> {
    if mobile.len() != reference.len() {
        return Err(AlignmentError::LengthMismatch {
            mobile: mobile.len(),
            reference: reference.len(),
        });
    }
    if mobile.is_empty() {
        return Err(AlignmentError::Empty);
    }

    let mobile_center = centroid(mobile);
    let reference_center = centroid(reference);

    let rotation = match mobile.len() {
        1 => Rotation3::identity(),
        2 => {
            let from = mobile[1] - mobile[0];
            let to = reference[1] - reference[0];
            Rotation3::rotation_between(&from, &to).unwrap_or_else(Rotation3::identity)
        }
        _ => {
            let covariance = mobile.iter().zip(reference).fold(
                Matrix3::zeros(),
                |acc, (m, r)| acc + (r - reference_center) * (m - mobile_center).transpose(),
            );
            let svd = covariance.svd(true, true);
            let u = svd.u.ok_or(AlignmentError::Decomposition)?;
            let v_t = svd.v_t.ok_or(AlignmentError::Decomposition)?;

            let mut correction = Matrix3::identity();
            if (u * v_t).determinant() < 0.0 {
                correction[(2, 2)] = -1.0;
            }
            Rotation3::from_matrix(&(u * correction * v_t))
        }
    };

    let translation = reference_center.coords - rotation * mobile_center.coords;
    Ok(RigidTransform {
        rotation,
        translation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    fn assert_close(a: &Point3<f64>, b: &Point3<f64>) {
        assert!((a - b).norm() < 1e-6, "{a:?} != {b:?}");
    }

    #[test]
    fn pure_translation_is_recovered() {
        let from = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let to: Vec<_> = from
            .iter()
            .map(|p| p + Vector3::new(10.0, 20.0, 30.0))
            .collect();

        let transform = superpose(&from, &to).unwrap();
        assert!(transform.rotation.angle().abs() < 1e-9);
        assert!((transform.translation - Vector3::new(10.0, 20.0, 30.0)).norm() < 1e-9);
    }

    #[test]
    fn rotation_and_translation_map_every_point() {
        let rotation = Rotation3::from_axis_angle(&Vector3::z_axis(), FRAC_PI_2);
        let shift = Vector3::new(-1.0, 2.5, 0.5);
        let from = [
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 2.0, 0.0),
            Point3::new(0.0, 0.0, 3.0),
            Point3::new(1.0, 1.0, 1.0),
        ];
        let to: Vec<_> = from.iter().map(|p| rotation * p + shift).collect();

        let transform = superpose(&from, &to).unwrap();
        for (f, t) in from.iter().zip(&to) {
            assert_close(&transform.apply(f), t);
        }
    }

    #[test]
    fn mirrored_input_still_yields_a_proper_rotation() {
        let from = [
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(0.0, 0.0, 0.0),
        ];
        let to: Vec<_> = from.iter().map(|p| Point3::new(p.x, p.y, -p.z)).collect();
        let transform = superpose(&from, &to).unwrap();
        assert!((transform.rotation.matrix().determinant() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn single_point_is_a_translation() {
        let transform =
            superpose(&[Point3::new(1.0, 1.0, 1.0)], &[Point3::new(2.0, 3.0, 4.0)]).unwrap();
        assert_close(
            &transform.apply(&Point3::new(0.0, 0.0, 0.0)),
            &Point3::new(1.0, 2.0, 3.0),
        );
    }

    #[test]
    fn two_points_align_the_connecting_vector() {
        let from = [Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0)];
        let to = [Point3::new(5.0, 5.0, 5.0), Point3::new(5.0, 6.0, 5.0)];
        let transform = superpose(&from, &to).unwrap();
        assert_close(&transform.apply(&from[0]), &to[0]);
        assert_close(&transform.apply(&from[1]), &to[1]);
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let err = superpose(&[Point3::origin()], &[]).unwrap_err();
        assert_eq!(
            err,
            AlignmentError::LengthMismatch {
                mobile: 1,
                reference: 0
            }
        );
        assert_eq!(superpose(&[], &[]).unwrap_err(), AlignmentError::Empty);
    }
}
