use crate::{
    input::AccumulatedInput,
    locomotion::smoothing,
    prelude::*,
    viewmodel::{ViewmodelOf, Weapon, Weapons},
};

/// Registers the sway/bob animator for weapons of type `W`. Added for
/// [`HitscanWeaponState`](super::weapon::HitscanWeaponState) by
/// [`VantagePlugin`]; add it again for your own [`Weapon`] implementations.
pub fn plugin<W: Weapon>(app: &mut App) {
    // Before the fixed loop: the accumulated input of this frame is still
    // intact there, and the animation runs once per frame either way.
    app.add_systems(
        RunFixedMainLoop,
        update_sway_bob::<W>.in_set(RunFixedMainLoopSystems::BeforeFixedMainLoop),
    );
}

/// Tuning for the view-model sway and bob animation. Lives on the view-model
/// pivot entity together with [`SwayBobState`] and a [`ViewmodelOf`] handle.
#[derive(Component, Clone, Reflect, Debug)]
#[reflect(Component)]
#[require(SwayBobState, Transform)]
pub struct SwayBob {
    /// Scale from inverted look delta to sway offset.
    pub rotation_step: f32,
    /// Positional sway clamp per axis.
    pub max_step_distance: f32,
    /// Rotational sway clamp in degrees per axis.
    pub max_rotation_step: f32,
    /// Sway magnitude multiplier while aiming.
    pub aim_sway_scale: f32,
    /// Positional counter-offset against directional input.
    pub travel_limit: Vec3,
    /// Amplitude of the cyclic bob per axis.
    pub bob_limit: Vec3,
    /// How strongly directional input speeds up the bob phase.
    pub bob_exaggeration: f32,
    /// Amplitude of the cyclic bob rotation in degrees per axis.
    pub bob_rotation_multiplier: Vec3,
    /// Exponential rate toward the composite offset.
    pub position_smoothing: f32,
    pub rotation_smoothing: f32,
    /// Exponential rate toward the neutral pose while aiming.
    pub aim_position_smoothing: f32,
    pub aim_rotation_smoothing: f32,
    pub mode: BobMode,
}

impl Default for SwayBob {
    fn default() -> Self {
        Self {
            rotation_step: 4.0,
            max_step_distance: 0.06,
            max_rotation_step: 5.0,
            aim_sway_scale: 0.3,
            travel_limit: Vec3::splat(0.025),
            bob_limit: Vec3::splat(0.01),
            bob_exaggeration: 8.0,
            bob_rotation_multiplier: Vec3::splat(2.0),
            position_smoothing: 10.0,
            rotation_smoothing: 12.0,
            aim_position_smoothing: 15.0,
            aim_rotation_smoothing: 12.0,
            mode: BobMode::Full,
        }
    }
}

/// The full bob uses the phase/exaggeration formulas; [`BobMode::Simple`] is
/// the lighter variant for weapons without bob tuning: a single-axis sine
/// keyed off the mover's speed, with its timer reset when nearly stationary.
#[derive(Reflect, Clone, Debug)]
pub enum BobMode {
    Full,
    Simple {
        frequency: f32,
        amplitude: f32,
        speed_threshold: f32,
    },
}

/// Runtime offsets of a view-model pivot. `phase` is the argument to the
/// periodic bob functions; in full mode it only ever advances.
#[derive(Component, Clone, Reflect, Default, Debug)]
#[reflect(Component)]
pub struct SwayBobState {
    pub sway_position: Vec3,
    /// Sway rotation in Euler degrees.
    pub sway_euler: Vec3,
    pub bob_position: Vec3,
    /// Bob rotation in Euler degrees.
    pub bob_euler: Vec3,
    pub phase: f32,
}

fn update_sway_bob<W: Weapon>(
    mut viewmodels: Query<(&SwayBob, &mut SwayBobState, &mut Transform, &ViewmodelOf)>,
    controllers: Query<(&FirstPersonState, &AccumulatedInput, Option<&Weapons>)>,
    weapons: Query<&W>,
    time: Res<Time>,
) {
    let dt = time.delta_secs();
    for (cfg, mut state, mut transform, viewmodel_of) in &mut viewmodels {
        let Ok((locomotion, input, related_weapons)) = controllers.get(viewmodel_of.0) else {
            continue;
        };
        let aiming = related_weapons
            .into_iter()
            .flat_map(|weapons_rel| weapons.iter_many(weapons_rel.iter()))
            .any(|weapon| weapon.is_aiming());

        let walk = input.movement().normalize_or_zero();
        let (sway_position, sway_euler) = sway_offsets(cfg, input.look, aiming);
        state.sway_position = sway_position;
        state.sway_euler = sway_euler;

        match cfg.mode {
            BobMode::Full => {
                state.phase = advance_phase(
                    cfg,
                    state.phase,
                    walk,
                    locomotion.grounded,
                    locomotion.running,
                    dt,
                );
                state.bob_position = bob_position(
                    cfg,
                    state.phase,
                    walk,
                    locomotion.grounded,
                    locomotion.running,
                );
                state.bob_euler = bob_rotation(cfg, state.phase, walk, locomotion.running);
            }
            BobMode::Simple {
                frequency,
                amplitude,
                speed_threshold,
            } => {
                state.phase =
                    simple_phase(state.phase, locomotion.current_speed, speed_threshold, dt);
                state.bob_position = Vec3::Y * ((state.phase * frequency).sin() * amplitude);
                state.bob_euler = Vec3::ZERO;
            }
        }

        if aiming {
            // Steady aim: collapse both offsets toward the neutral pose.
            transform.translation = transform
                .translation
                .lerp(Vec3::ZERO, smoothing(cfg.aim_position_smoothing, dt));
            transform.rotation = transform
                .rotation
                .slerp(Quat::IDENTITY, smoothing(cfg.aim_rotation_smoothing, dt));
        } else {
            let target_position = state.sway_position + state.bob_position;
            let target_rotation =
                euler_degrees(state.sway_euler) * euler_degrees(state.bob_euler);
            transform.translation = transform
                .translation
                .lerp(target_position, smoothing(cfg.position_smoothing, dt));
            transform.rotation = transform
                .rotation
                .slerp(target_rotation, smoothing(cfg.rotation_smoothing, dt));
        }
    }
}

/// The simple bob timer: runs while the mover is above the speed threshold,
/// snaps back to zero when it is not, so the sine always restarts from its
/// rest point.
fn simple_phase(phase: f32, current_speed: f32, speed_threshold: f32, dt: f32) -> f32 {
    if current_speed > speed_threshold {
        phase + dt
    } else {
        0.0
    }
}

fn euler_degrees(euler: Vec3) -> Quat {
    Quat::from_euler(
        EulerRot::XYZ,
        euler.x.to_radians(),
        euler.y.to_radians(),
        euler.z.to_radians(),
    )
}

/// Inverted look delta, clamped, with sway attenuated to a fraction of its
/// range while aiming. Returns (position offset, Euler rotation in degrees).
fn sway_offsets(cfg: &SwayBob, look: Vec2, aiming: bool) -> (Vec3, Vec3) {
    let aim_multiplier = if aiming { cfg.aim_sway_scale } else { 1.0 };
    let invert = look * -cfg.rotation_step;

    let step = cfg.max_step_distance * aim_multiplier;
    let position = Vec3::new(invert.x.clamp(-step, step), invert.y.clamp(-step, step), 0.0);

    let step = cfg.max_rotation_step * aim_multiplier;
    let x = invert.x.clamp(-step, step);
    let y = invert.y.clamp(-step, step);
    let rotation = Vec3::new(y, x, x);

    (position, rotation)
}

/// The bob phase advances faster the harder the player pushes the move axes
/// (doubled while running), at a slow constant rate in the air, and always by
/// a small idle amount so the breathing motion never freezes.
fn advance_phase(
    cfg: &SwayBob,
    phase: f32,
    walk: Vec2,
    grounded: bool,
    running: bool,
    dt: f32,
) -> f32 {
    let run_multiplier = if running { 2.0 } else { 1.0 };
    let rate = if grounded {
        walk.x.abs() + walk.y.abs() * cfg.bob_exaggeration * run_multiplier
    } else {
        1.0
    };
    phase + dt * rate + 0.01
}

fn bob_position(cfg: &SwayBob, phase: f32, walk: Vec2, grounded: bool, running: bool) -> Vec3 {
    let run_multiplier = if running { 2.0 } else { 1.0 };
    let grounded_factor = if grounded { 1.0 } else { 0.0 };
    Vec3::new(
        phase.cos() * cfg.bob_limit.x * run_multiplier * grounded_factor
            - walk.x * cfg.travel_limit.x,
        phase.sin() * cfg.bob_limit.y * run_multiplier - walk.y * cfg.travel_limit.y,
        -(walk.y * cfg.travel_limit.z),
    )
}

/// Euler degrees. Idle falls back to a half-magnitude pitch-only breathing
/// motion; active movement rolls with the strafe direction.
fn bob_rotation(cfg: &SwayBob, phase: f32, walk: Vec2, running: bool) -> Vec3 {
    let run_multiplier = if running { 2.0 } else { 1.0 };
    if walk != Vec2::ZERO {
        Vec3::new(
            cfg.bob_rotation_multiplier.x * run_multiplier * (2.0 * phase).sin(),
            cfg.bob_rotation_multiplier.y * run_multiplier * phase.cos(),
            cfg.bob_rotation_multiplier.z * run_multiplier * phase.cos() * walk.x,
        )
    } else {
        Vec3::new(
            cfg.bob_rotation_multiplier.x * ((2.0 * phase).sin() / 2.0),
            0.0,
            0.0,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> SwayBob {
        SwayBob::default()
    }

    #[test]
    fn sway_is_clamped_to_the_max_step() {
        let cfg = cfg();
        let (position, rotation) = sway_offsets(&cfg, Vec2::new(100.0, -100.0), false);
        assert_eq!(position.x, -cfg.max_step_distance);
        assert_eq!(position.y, cfg.max_step_distance);
        assert_eq!(rotation.y, -cfg.max_rotation_step);
        assert_eq!(rotation.x, cfg.max_rotation_step);
    }

    #[test]
    fn sway_inverts_the_look_delta() {
        let cfg = cfg();
        let (position, _) = sway_offsets(&cfg, Vec2::new(0.01, 0.0), false);
        assert!(position.x < 0.0);
    }

    #[test]
    fn aiming_attenuates_the_sway_range() {
        let cfg = cfg();
        let (hip, _) = sway_offsets(&cfg, Vec2::splat(100.0), false);
        let (aimed, _) = sway_offsets(&cfg, Vec2::splat(100.0), true);
        assert_eq!(aimed.x, hip.x * cfg.aim_sway_scale);
    }

    #[test]
    fn phase_advances_faster_while_moving_on_the_ground() {
        let cfg = cfg();
        let idle = advance_phase(&cfg, 0.0, Vec2::ZERO, true, false, 0.02);
        let walking = advance_phase(&cfg, 0.0, Vec2::Y, true, false, 0.02);
        let running = advance_phase(&cfg, 0.0, Vec2::Y, true, true, 0.02);
        assert!(idle > 0.0);
        assert!(walking > idle);
        assert!(running > walking);
    }

    #[test]
    fn phase_still_advances_in_the_air() {
        let cfg = cfg();
        let airborne = advance_phase(&cfg, 1.0, Vec2::Y, false, true, 0.02);
        assert!(airborne > 1.0);
    }

    #[test]
    fn airborne_bob_loses_its_lateral_cycle() {
        let cfg = cfg();
        // phase 0: cos = 1, so the grounded lateral term is at its peak.
        let grounded = bob_position(&cfg, 0.0, Vec2::ZERO, true, false);
        let airborne = bob_position(&cfg, 0.0, Vec2::ZERO, false, false);
        assert_eq!(grounded.x, cfg.bob_limit.x);
        assert_eq!(airborne.x, 0.0);
        // The vertical cycle keeps going either way.
        assert_eq!(grounded.y, airborne.y);
    }

    #[test]
    fn running_doubles_the_bob_amplitude() {
        let cfg = cfg();
        let walking = bob_position(&cfg, 0.0, Vec2::ZERO, true, false);
        let running = bob_position(&cfg, 0.0, Vec2::ZERO, true, true);
        assert_eq!(running.x, walking.x * 2.0);
    }

    #[test]
    fn idle_bob_rotation_is_a_half_magnitude_breath() {
        let cfg = cfg();
        let phase = 0.4;
        let moving = bob_rotation(&cfg, phase, Vec2::Y, false);
        let idle = bob_rotation(&cfg, phase, Vec2::ZERO, false);
        assert_eq!(idle.x, moving.x / 2.0);
        assert_eq!(idle.y, 0.0);
        assert_eq!(idle.z, 0.0);
    }

    #[test]
    fn strafe_direction_signs_the_bob_roll() {
        let cfg = cfg();
        let left = bob_rotation(&cfg, 0.0, Vec2::new(-1.0, 0.0), false);
        let right = bob_rotation(&cfg, 0.0, Vec2::new(1.0, 0.0), false);
        assert_eq!(left.z, -right.z);
    }

    #[test]
    fn simple_bob_timer_resets_when_nearly_stationary() {
        assert_eq!(simple_phase(1.5, 3.0, 0.1, 0.02), 1.52);
        assert_eq!(simple_phase(1.5, 0.05, 0.1, 0.02), 0.0);
    }

    #[test]
    fn travel_offset_counters_the_move_direction() {
        let cfg = cfg();
        let forward = bob_position(&cfg, 0.0, Vec2::Y, false, false);
        assert_eq!(forward.z, -cfg.travel_limit.z);
    }
}
