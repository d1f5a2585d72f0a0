use bevy_ecs::{intern::Interned, schedule::ScheduleLabel};
use tracing::warn;

use crate::{input::AccumulatedInput, prelude::*};

pub(super) fn plugin(schedule: Interned<dyn ScheduleLabel>) -> impl Fn(&mut App) {
    move |app: &mut App| {
        app.add_systems(schedule, run_locomotion.in_set(VantageSystems::Locomotion));
    }
}

/// Downward velocity is clamped to this while grounded. Keeps the character
/// pressed to the ground without accumulating fall speed while resting.
const GROUNDED_STICK_VELOCITY: f32 = -2.0;

/// Per-tick locomotion. The ground sensor ran earlier this tick
/// ([`VantageSystems::GroundCheck`]) and look yaw was applied by the
/// [`RotateCamera`] observer before the fixed loop, so the remaining order
/// here is: movement, jump/gravity, lean, crouch. Each step feeds the next
/// tick's published state.
fn run_locomotion(
    mut controllers: Query<(
        &FirstPersonController,
        &mut FirstPersonState,
        &mut AccumulatedInput,
        &mut Transform,
        &mut Collider,
    )>,
    time: Res<Time>,
) {
    let dt = time.delta_secs();
    for (cfg, mut state, mut input, mut transform, mut collider) in &mut controllers {
        let movement = input.movement();

        apply_movement(cfg, &mut state, &mut transform, movement, input.sprinting, dt);

        let jump_pressed = std::mem::take(&mut input.jumped);
        jump_and_gravity(cfg, &mut state, jump_pressed, dt);

        let lean_target = lean_target(cfg.lean_angle, input.lean_left, input.lean_right);
        state.lean = lean_step(state.lean, lean_target, !state.grounded, cfg.lean_speed, dt);

        if std::mem::take(&mut input.crouch_pressed) {
            toggle_crouch(&mut state);
            *collider = state.collider().clone();
        }
        let view_target = if state.crouching {
            cfg.crouch_view_height
        } else {
            cfg.standing_view_height
        };
        state.view_height = ease_view_height(state.view_height, view_target, cfg.view_height_rate, dt);

        validate_state(&mut state);
    }
}

/// Saturating exponential smoothing factor for `lerp(current, target, rate * dt)`.
pub(crate) fn smoothing(rate: f32, dt: f32) -> f32 {
    (rate * dt).min(1.0)
}

/// Smooth the current speed toward its target, decaying to zero without
/// directional input. With `rate * dt >= 1` the target is reached in one tick.
fn smooth_speed(current: f32, target: f32, rate: f32, dt: f32) -> f32 {
    current.lerp(target, smoothing(rate, dt))
}

fn apply_movement(
    cfg: &FirstPersonController,
    state: &mut FirstPersonState,
    transform: &mut Transform,
    movement: Vec2,
    sprinting: bool,
    dt: f32,
) {
    let moving = movement != Vec2::ZERO;
    let target_speed = if state.crouching {
        cfg.crouch_speed
    } else if sprinting {
        cfg.sprint_speed
    } else {
        cfg.move_speed
    };
    let target_speed = if moving { target_speed } else { 0.0 };
    state.current_speed = smooth_speed(state.current_speed, target_speed, cfg.speed_change_rate, dt);
    state.running = sprinting && moving && !state.crouching;

    let direction = transform.right() * movement.x + transform.forward() * movement.y;
    let horizontal = direction.normalize_or_zero() * state.current_speed;
    transform.translation += horizontal * dt + Vec3::Y * (state.vertical_velocity * dt);
}

/// Upward velocity that peaks at `jump_height` under constant `gravity`.
fn jump_impulse(jump_height: f32, gravity: f32) -> f32 {
    (jump_height * -2.0 * gravity).sqrt()
}

fn jump_and_gravity(
    cfg: &FirstPersonController,
    state: &mut FirstPersonState,
    jump_pressed: bool,
    dt: f32,
) {
    if state.grounded {
        if state.vertical_velocity < 0.0 {
            state.vertical_velocity = GROUNDED_STICK_VELOCITY;
        }
        state.jump_cooldown = (state.jump_cooldown - dt).max(0.0);
        if jump_pressed && state.jump_cooldown <= 0.0 {
            state.vertical_velocity = jump_impulse(cfg.jump_height, cfg.gravity);
            state.jump_cooldown = cfg.jump_cooldown;
        }
    } else {
        // Recharged every airborne tick so a jump is ready on the next
        // ground contact once the cooldown has elapsed there.
        state.jump_cooldown = cfg.jump_cooldown;
    }
    state.vertical_velocity += cfg.gravity * dt;
}

fn lean_target(lean_angle: f32, left: bool, right: bool) -> f32 {
    let mut target = 0.0;
    if left {
        target += lean_angle;
    }
    if right {
        target -= lean_angle;
    }
    target
}

/// Eases the lean roll toward its target. While airborne the lean is first
/// pulled toward zero, then blended toward the input target, so air time
/// dampens the lean without hard-resetting it.
fn lean_step(current: f32, target: f32, airborne: bool, lean_speed: f32, dt: f32) -> f32 {
    let mut lean = current;
    if airborne {
        lean = lean.lerp(0.0, smoothing(lean_speed, dt));
    }
    lean.lerp(target, smoothing(lean_speed, dt))
}

/// Swaps the stand/crouch state. The caller swaps the live collider; the
/// camera height is eased separately, so toggling never teleports anything.
fn toggle_crouch(state: &mut FirstPersonState) {
    state.crouching = !state.crouching;
}

fn ease_view_height(current: f32, target: f32, rate: f32, dt: f32) -> f32 {
    current.lerp(target, smoothing(rate, dt))
}

fn validate_state(state: &mut FirstPersonState) {
    for value in [&mut state.vertical_velocity, &mut state.current_speed] {
        if !value.is_finite() {
            warn!("locomotion state is not finite: {value}, setting to 0");
            *value = 0.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> FirstPersonController {
        FirstPersonController::default()
    }

    fn grounded_state() -> FirstPersonState {
        FirstPersonState {
            grounded: true,
            ..default()
        }
    }

    #[test]
    fn speed_lerp_saturates_in_one_tick() {
        // rate * dt = 1.0, so the sprint target is reached immediately.
        assert_eq!(smooth_speed(0.0, 9.0, 10.0, 0.1), 9.0);
    }

    #[test]
    fn speed_decays_toward_zero_without_input() {
        let speed = smooth_speed(5.0, 0.0, 10.0, 0.05);
        assert_eq!(speed, 2.5);
        assert!(smooth_speed(speed, 0.0, 10.0, 0.05) < speed);
    }

    #[test]
    fn gravity_integrates_while_airborne() {
        let cfg = cfg();
        let mut state = FirstPersonState::default();
        jump_and_gravity(&cfg, &mut state, false, 0.02);
        assert!((state.vertical_velocity - -0.3).abs() < 1e-6);
    }

    #[test]
    fn grounded_fall_speed_is_clamped_before_gravity() {
        let cfg = cfg();
        let mut state = grounded_state();
        state.vertical_velocity = -40.0;
        let dt = 0.02;
        jump_and_gravity(&cfg, &mut state, false, dt);
        assert_eq!(state.vertical_velocity, -2.0 + cfg.gravity * dt);
    }

    #[test]
    fn jump_applies_the_apex_impulse_and_resets_the_cooldown() {
        let cfg = cfg();
        assert_eq!(
            jump_impulse(cfg.jump_height, cfg.gravity),
            (cfg.jump_height * 2.0 * cfg.gravity.abs()).sqrt()
        );

        let mut state = grounded_state();
        let dt = 0.02;
        jump_and_gravity(&cfg, &mut state, true, dt);
        assert_eq!(
            state.vertical_velocity,
            jump_impulse(cfg.jump_height, cfg.gravity) + cfg.gravity * dt
        );
        assert_eq!(state.jump_cooldown, cfg.jump_cooldown);
    }

    #[test]
    fn jump_is_blocked_while_the_cooldown_runs() {
        let cfg = cfg();
        let mut state = grounded_state();
        state.jump_cooldown = cfg.jump_cooldown;
        let dt = 0.02;
        jump_and_gravity(&cfg, &mut state, true, dt);
        assert!(state.vertical_velocity < 0.0);
    }

    #[test]
    fn cooldown_never_goes_negative() {
        let cfg = cfg();
        let mut state = grounded_state();
        state.jump_cooldown = 0.05;
        for _ in 0..20 {
            jump_and_gravity(&cfg, &mut state, false, 0.02);
            state.vertical_velocity = 0.0;
            assert!(state.jump_cooldown >= 0.0);
        }
        assert_eq!(state.jump_cooldown, 0.0);
    }

    #[test]
    fn cooldown_recharges_while_airborne() {
        let cfg = cfg();
        let mut state = FirstPersonState::default();
        state.jump_cooldown = 0.0;
        jump_and_gravity(&cfg, &mut state, false, 0.02);
        assert_eq!(state.jump_cooldown, cfg.jump_cooldown);
    }

    #[test]
    fn crouch_toggle_round_trips() {
        let mut state = FirstPersonState::default();
        toggle_crouch(&mut state);
        assert!(state.crouching);
        toggle_crouch(&mut state);
        assert!(!state.crouching);
    }

    #[test]
    fn lean_approaches_the_held_side() {
        let target = lean_target(15.0, true, false);
        assert_eq!(target, 15.0);
        let mut lean = 0.0;
        for _ in 0..100 {
            lean = lean_step(lean, target, false, 8.0, 0.02);
        }
        assert!((lean - 15.0).abs() < 0.1);
        assert_eq!(lean_target(15.0, false, true), -15.0);
        assert_eq!(lean_target(15.0, true, true), 0.0);
    }

    #[test]
    fn airborne_lean_is_suppressed_but_not_reset() {
        let grounded = lean_step(10.0, 10.0, false, 8.0, 0.02);
        let airborne = lean_step(10.0, 10.0, true, 8.0, 0.02);
        assert!(airborne < grounded);
        assert!(airborne > 0.0);
    }

    #[test]
    fn sprinting_with_input_targets_sprint_speed() {
        let cfg = cfg();
        let mut state = grounded_state();
        let mut transform = Transform::default();
        apply_movement(&cfg, &mut state, &mut transform, Vec2::Y, true, 0.1);
        assert_eq!(state.current_speed, cfg.sprint_speed);
        assert!(state.running);
    }

    #[test]
    fn crouching_overrides_sprint() {
        let cfg = cfg();
        let mut state = grounded_state();
        state.crouching = true;
        let mut transform = Transform::default();
        apply_movement(&cfg, &mut state, &mut transform, Vec2::Y, true, 0.1);
        assert_eq!(state.current_speed, cfg.crouch_speed);
        assert!(!state.running);
    }

    #[test]
    fn displacement_follows_speed_and_vertical_velocity() {
        let cfg = cfg();
        let mut state = grounded_state();
        state.vertical_velocity = -2.0;
        let mut transform = Transform::default();
        apply_movement(&cfg, &mut state, &mut transform, Vec2::Y, false, 0.1);
        // Full forward input at walk speed: 5 m/s * 0.1 s along -Z.
        assert!((transform.translation.z - -0.5).abs() < 1e-6);
        assert!((transform.translation.y - -0.2).abs() < 1e-6);
        assert_eq!(transform.translation.x, 0.0);
    }

    #[test]
    fn view_height_eases_toward_the_crouch_target() {
        let cfg = cfg();
        let eased = ease_view_height(
            cfg.standing_view_height,
            cfg.crouch_view_height,
            cfg.view_height_rate,
            0.02,
        );
        assert!(eased < cfg.standing_view_height);
        assert!(eased > cfg.crouch_view_height);
    }

    #[test]
    fn non_finite_state_is_zeroed() {
        let mut state = FirstPersonState::default();
        state.vertical_velocity = f32::NAN;
        state.current_speed = f32::INFINITY;
        validate_state(&mut state);
        assert_eq!(state.vertical_velocity, 0.0);
        assert_eq!(state.current_speed, 0.0);
    }
}
