//! Reduced-order planar dynamics of the half-cheetah.
//!
//! Generalized coordinates are root x, root z (relative to the initial torso
//! height), root pitch, then the six hinges in the order back thigh, back shin,
//! back foot, front thigh, front shin, front foot. The mass matrix is diagonal.
//! Legs are massless apart from the rotational inertia of their hinges, so the
//! torso and the legs interact only through ground contact. The mass of the legs
//! is lumped into the torso, and hinge inertias include the segments they swing.

/// The number of generalized coordinates.
pub(crate) const NQ: usize = 9;

/// The number of actuators.
pub(crate) const NU: usize = 6;

const TORSO_MASS: f64 = 14.0;
const TORSO_INERTIA: f64 = 3.0;
const TORSO_HEIGHT: f64 = 0.7;
const GRAVITY: f64 = 9.81;

const CONTACT_STIFFNESS: f64 = 5000.0;
const CONTACT_DAMPING: f64 = 30.0;
const FRICTION: f64 = 0.4;
const FRICTION_DAMPING: f64 = 30.0;
const LIMIT_STIFFNESS: f64 = 1000.0;

struct Hinge {
    gear: f64,
    stiffness: f64,
    damping: f64,
    inertia: f64,
    range: (f64, f64),
}

#[rustfmt::skip]
const HINGES: [Hinge; NU] = [
    Hinge { gear: 120.0, stiffness: 240.0, damping: 6.0, inertia: 0.9, range: (-0.52, 1.05) },
    Hinge { gear: 90.0, stiffness: 180.0, damping: 4.5, inertia: 0.6, range: (-0.785, 0.785) },
    Hinge { gear: 60.0, stiffness: 120.0, damping: 3.0, inertia: 0.3, range: (-0.4, 0.785) },
    Hinge { gear: 120.0, stiffness: 180.0, damping: 4.5, inertia: 0.9, range: (-1.0, 0.7) },
    Hinge { gear: 60.0, stiffness: 120.0, damping: 3.0, inertia: 0.6, range: (-1.2, 0.87) },
    Hinge { gear: 30.0, stiffness: 60.0, damping: 1.5, inertia: 0.3, range: (-0.5, 0.5) },
];

/// A leg attached to the torso at `hip`, with thigh, shin and foot segments
/// given in the frame of their parent at zero hinge angles.
struct Leg {
    hip: [f64; 2],
    segments: [[f64; 2]; 3],
    first_hinge: usize,
}

const LEGS: [Leg; 2] = [
    Leg {
        hip: [-0.5, 0.0],
        segments: [[0.16, -0.25], [-0.28, -0.14], [0.06, -0.19]],
        first_hinge: 0,
    },
    Leg {
        hip: [0.5, 0.0],
        segments: [[-0.14, -0.24], [0.13, -0.18], [0.09, -0.14]],
        first_hinge: 3,
    },
];

const TORSO_ENDS: [[f64; 2]; 2] = [[-0.5, 0.0], [0.6, 0.1]];

fn rotate(v: [f64; 2], angle: f64) -> [f64; 2] {
    let (s, c) = angle.sin_cos();
    [v[0] * c + v[1] * s, -v[0] * s + v[1] * c]
}

/// Derivative of `rotate(v, angle)` with respect to `angle`, given `r = rotate(v, angle)`.
fn perp(r: [f64; 2]) -> [f64; 2] {
    [r[1], -r[0]]
}

fn add(a: [f64; 2], b: [f64; 2]) -> [f64; 2] {
    [a[0] + b[0], a[1] + b[1]]
}

fn sub(a: [f64; 2], b: [f64; 2]) -> [f64; 2] {
    [a[0] - b[0], a[1] - b[1]]
}

/// A point that can touch the ground.
struct ContactPoint {
    pos: [f64; 2],
    /// Derivative of `pos` with respect to every generalized coordinate.
    jac: [[f64; 2]; NQ],
}

/// Positions and velocities of the generalized coordinates.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CheetahState {
    pub qpos: [f64; NQ],
    pub qvel: [f64; NQ],
}

impl Default for CheetahState {
    fn default() -> Self {
        Self {
            qpos: [0.0; NQ],
            qvel: [0.0; NQ],
        }
    }
}

impl CheetahState {
    /// Absolute position of the torso center.
    fn torso_pos(&self) -> [f64; 2] {
        [self.qpos[0], TORSO_HEIGHT + self.qpos[1]]
    }

    /// Torso ends, then the shin and foot tips of the back and front legs.
    fn contact_points(&self) -> Vec<ContactPoint> {
        let base = self.torso_pos();
        let pitch = self.qpos[2];
        let root_jac = |pos: [f64; 2]| {
            let mut jac = [[0.0; 2]; NQ];
            jac[0] = [1.0, 0.0];
            jac[1] = [0.0, 1.0];
            jac[2] = perp(sub(pos, base));
            jac
        };
        let mut points = Vec::with_capacity(6);

        for end in TORSO_ENDS {
            let pos = add(base, rotate(end, pitch));
            points.push(ContactPoint {
                pos,
                jac: root_jac(pos),
            });
        }

        for leg in LEGS.iter() {
            let mut joint = add(base, rotate(leg.hip, pitch));
            let mut angle = pitch;
            let mut pivots = Vec::with_capacity(3);
            for (k, segment) in leg.segments.iter().enumerate() {
                let dof = 3 + leg.first_hinge + k;
                angle += self.qpos[dof];
                pivots.push((dof, joint));
                let tip = add(joint, rotate(*segment, angle));
                if k > 0 {
                    let mut jac = root_jac(tip);
                    for (d, pivot) in pivots.iter() {
                        jac[*d] = perp(sub(tip, *pivot));
                    }
                    points.push(ContactPoint { pos: tip, jac });
                }
                joint = tip;
            }
        }

        points
    }

    /// Generalized forces of gravity, actuators, hinge springs, hinge limits
    /// and ground contact. Hinge damping is left to the integrator.
    fn forces(&self, ctrl: &[f64; NU]) -> [f64; NQ] {
        let mut force = [0.0; NQ];
        force[1] -= TORSO_MASS * GRAVITY;

        for (i, hinge) in HINGES.iter().enumerate() {
            let q = self.qpos[3 + i];
            let mut tau = hinge.gear * ctrl[i] - hinge.stiffness * q;
            if q < hinge.range.0 {
                tau += LIMIT_STIFFNESS * (hinge.range.0 - q);
            } else if q > hinge.range.1 {
                tau -= LIMIT_STIFFNESS * (q - hinge.range.1);
            }
            force[3 + i] += tau;
        }

        for point in self.contact_points() {
            let depth = -point.pos[1];
            if depth <= 0.0 {
                continue;
            }
            let mut vel = [0.0; 2];
            for (j, qd) in point.jac.iter().zip(self.qvel.iter()) {
                vel[0] += j[0] * qd;
                vel[1] += j[1] * qd;
            }
            let normal = (CONTACT_STIFFNESS * depth - CONTACT_DAMPING * vel[1]).max(0.0);
            let limit = FRICTION * normal;
            let tangent = (-FRICTION_DAMPING * vel[0]).clamp(-limit, limit);
            for (f, j) in force.iter_mut().zip(point.jac.iter()) {
                *f += j[0] * tangent + j[1] * normal;
            }
        }

        force
    }

    /// Advances the state by `dt` with semi-implicit Euler.
    ///
    /// Hinge damping is integrated implicitly.
    pub fn integrate(&mut self, ctrl: &[f64; NU], dt: f64) {
        let force = self.forces(ctrl);
        self.qvel[0] += dt * force[0] / TORSO_MASS;
        self.qvel[1] += dt * force[1] / TORSO_MASS;
        self.qvel[2] += dt * force[2] / TORSO_INERTIA;
        for (i, hinge) in HINGES.iter().enumerate() {
            let d = 3 + i;
            self.qvel[d] = (self.qvel[d] + dt * force[d] / hinge.inertia)
                / (1.0 + dt * hinge.damping / hinge.inertia);
        }
        for (q, qd) in self.qpos.iter_mut().zip(self.qvel.iter()) {
            *q += dt * qd;
        }
    }

    /// Returns `true` if all coordinates are finite.
    pub fn is_finite(&self) -> bool {
        self.qpos.iter().chain(self.qvel.iter()).all(|x| x.is_finite())
    }

    /// `qpos[1..]` followed by `qvel`.
    pub fn observation(&self) -> Vec<f32> {
        self.qpos[1..]
            .iter()
            .chain(self.qvel.iter())
            .map(|x| *x as f32)
            .collect()
    }
}
