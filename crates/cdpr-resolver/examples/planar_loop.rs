//! Planar CDPR Resolution Loop
//!
//! Demonstrates the resolver inside a fixed-rate control loop:
//! - a planar 4-cable point-mass CDPR with anchors at the frame corners
//! - a circular reference trajectory
//! - one QP resolve per time step, warm-started from the previous step
//!
//! The snapshot construction below stands in for the external dynamics
//! model: it assembles the structure matrix from the cable geometry and the
//! required wrench from the reference acceleration.

use nalgebra::{DMatrix, DVector, Vector2};

use cdpr_resolver::{
    BoundCentringObjective, DynamicsSnapshot, IdResolver, ResolverConfig, TotalTensionLimit,
};

const GRAVITY: f64 = 9.81;

/// Frame anchor positions, one per cable [m].
const ANCHORS: [[f64; 2]; 4] = [[-2.0, -2.0], [2.0, -2.0], [2.0, 2.0], [-2.0, 2.0]];

/// Build the snapshot for one instant of a planar point-mass CDPR.
///
/// Force balance: Σ tᵢ uᵢ = m (p̈ - g), with uᵢ the unit vector from the
/// platform toward anchor i.
fn snapshot_at(
    position: Vector2<f64>,
    acceleration: Vector2<f64>,
    mass: f64,
) -> DynamicsSnapshot {
    let mut a_eq = DMatrix::zeros(2, ANCHORS.len());
    for (i, anchor) in ANCHORS.iter().enumerate() {
        let direction = (Vector2::new(anchor[0], anchor[1]) - position).normalize();
        a_eq[(0, i)] = direction[0];
        a_eq[(1, i)] = direction[1];
    }
    let wrench = mass * (acceleration - Vector2::new(0.0, -GRAVITY));
    let b_eq = DVector::from_row_slice(&[wrench[0], wrench[1]]);

    let f_min = DVector::from_element(ANCHORS.len(), 1.0); // keep cables taut
    let f_max = DVector::from_element(ANCHORS.len(), 80.0);

    DynamicsSnapshot::new(a_eq, b_eq, f_min, f_max).expect("consistent demo geometry")
}

fn main() {
    println!("=== Planar CDPR force distribution loop ===\n");

    let mass = 5.0; // platform mass [kg]
    let dt = 0.02; // 50 Hz control rate
    let steps = 100;
    let radius = 0.8;
    let omega = 1.5; // trajectory angular rate [rad/s]

    let mut resolver = IdResolver::new(
        ResolverConfig::default(),
        Box::new(BoundCentringObjective::new()),
    )
    .expect("default backend is always available");
    resolver.add_constraint(Box::new(TotalTensionLimit::new(250.0)));

    let mut failures = 0;
    let mut total_iterations = 0;

    for step in 0..steps {
        let t = step as f64 * dt;
        let position = Vector2::new(radius * (omega * t).cos(), radius * (omega * t).sin());
        let acceleration = -omega * omega * position;

        let snapshot = snapshot_at(position, acceleration, mass);
        let resolution = resolver
            .resolve(&snapshot)
            .expect("demo snapshots are well-formed");

        total_iterations += resolution.iterations;
        if resolution.is_valid() {
            if step % 20 == 0 {
                println!(
                    "t = {:.2} s  forces = [{:.1}, {:.1}, {:.1}, {:.1}] N  cost = {:.2}",
                    t,
                    resolution.forces[0],
                    resolution.forces[1],
                    resolution.forces[2],
                    resolution.forces[3],
                    resolution.cost,
                );
            }
        } else {
            failures += 1;
            println!("t = {:.2} s  resolve failed: {:?}", t, resolution.exit_status);
        }
    }

    println!("\n{} steps, {} failures", steps, failures);
    println!(
        "average backend iterations per step: {:.2}",
        total_iterations as f64 / steps as f64
    );
}
