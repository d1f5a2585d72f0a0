use crate::prelude::*;

use crate::fixed_update_utils::did_fixed_timestep_run_this_frame;

pub(super) fn plugin(app: &mut App) {
    app.add_observer(apply_movement)
        .add_observer(apply_look)
        .add_observer(apply_jump)
        .add_observer(apply_sprint)
        .add_observer(apply_crouch)
        .add_observer(apply_lean_left)
        .add_observer(apply_lean_right)
        .add_observer(apply_aim)
        .add_observer(apply_fire)
        .add_systems(
            RunFixedMainLoop,
            clear_accumulated_input
                .run_if(did_fixed_timestep_run_this_frame)
                .in_set(RunFixedMainLoopSystems::AfterFixedMainLoop),
        )
        .add_systems(
            PreUpdate,
            clear_look_input.before(EnhancedInputSystems::Update),
        );
}

/// Directional movement axes, each in `[-1, 1]`.
#[derive(Debug, InputAction)]
#[action_output(Vec2)]
pub struct Movement;

/// Pointer delta. Drives yaw/pitch and, inverted, the weapon sway.
#[derive(Debug, InputAction)]
#[action_output(Vec2)]
pub struct RotateCamera;

/// Bind with a press condition; one jump per press.
#[derive(Debug, InputAction)]
#[action_output(bool)]
pub struct Jump;

/// Held.
#[derive(Debug, InputAction)]
#[action_output(bool)]
pub struct Sprint;

/// Bind with a press condition; each press toggles the crouch state.
#[derive(Debug, InputAction)]
#[action_output(bool)]
pub struct Crouch;

/// Held.
#[derive(Debug, InputAction)]
#[action_output(bool)]
pub struct LeanLeft;

/// Held.
#[derive(Debug, InputAction)]
#[action_output(bool)]
pub struct LeanRight;

/// Held. Press enters aiming, release returns to hip fire.
#[derive(Debug, InputAction)]
#[action_output(bool)]
pub struct Aim;

/// Bind with a press condition; one shot per press.
#[derive(Debug, InputAction)]
#[action_output(bool)]
pub struct FireWeapon;

/// Input accumulated since the last fixed update loop. One-shot flags
/// (`jumped`, `crouch_pressed`, `fired`) are consumed by exactly one tick;
/// held flags are re-asserted every frame by their observers. Cleared after
/// every fixed update loop.
#[derive(Component, Clone, Reflect, Default, Debug)]
#[reflect(Component)]
pub struct AccumulatedInput {
    /// The last non-zero move that was input since the last fixed update loop.
    pub last_movement: Option<Vec2>,
    /// This frame's pointer delta. Zeroed every frame, not every tick, so
    /// per-frame consumers (sway) see it decay to zero when the pointer rests.
    pub look: Vec2,
    pub jumped: bool,
    pub crouch_pressed: bool,
    pub fired: bool,
    pub sprinting: bool,
    pub lean_left: bool,
    pub lean_right: bool,
    pub aiming: bool,
}

impl AccumulatedInput {
    /// Movement axes as a plain vector, zero when nothing was input.
    pub fn movement(&self) -> Vec2 {
        self.last_movement.unwrap_or_default()
    }
}

fn apply_movement(
    movement: On<Fire<Movement>>,
    mut accumulated_inputs: Query<&mut AccumulatedInput>,
) {
    if let Ok(mut accumulated_inputs) = accumulated_inputs.get_mut(movement.context) {
        accumulated_inputs.last_movement = Some(movement.value);
    }
}

fn apply_look(look: On<Fire<RotateCamera>>, mut accumulated_inputs: Query<&mut AccumulatedInput>) {
    if let Ok(mut accumulated_inputs) = accumulated_inputs.get_mut(look.context) {
        accumulated_inputs.look = look.value;
    }
}

fn apply_jump(jump: On<Fire<Jump>>, mut accumulated_inputs: Query<&mut AccumulatedInput>) {
    if let Ok(mut accumulated_inputs) = accumulated_inputs.get_mut(jump.context) {
        accumulated_inputs.jumped = true;
    }
}

fn apply_sprint(sprint: On<Fire<Sprint>>, mut accumulated_inputs: Query<&mut AccumulatedInput>) {
    if let Ok(mut accumulated_inputs) = accumulated_inputs.get_mut(sprint.context) {
        accumulated_inputs.sprinting = true;
    }
}

fn apply_crouch(crouch: On<Fire<Crouch>>, mut accumulated_inputs: Query<&mut AccumulatedInput>) {
    if let Ok(mut accumulated_inputs) = accumulated_inputs.get_mut(crouch.context) {
        accumulated_inputs.crouch_pressed = true;
    }
}

fn apply_lean_left(lean: On<Fire<LeanLeft>>, mut accumulated_inputs: Query<&mut AccumulatedInput>) {
    if let Ok(mut accumulated_inputs) = accumulated_inputs.get_mut(lean.context) {
        accumulated_inputs.lean_left = true;
    }
}

fn apply_lean_right(
    lean: On<Fire<LeanRight>>,
    mut accumulated_inputs: Query<&mut AccumulatedInput>,
) {
    if let Ok(mut accumulated_inputs) = accumulated_inputs.get_mut(lean.context) {
        accumulated_inputs.lean_right = true;
    }
}

fn apply_aim(aim: On<Fire<Aim>>, mut accumulated_inputs: Query<&mut AccumulatedInput>) {
    if let Ok(mut accumulated_inputs) = accumulated_inputs.get_mut(aim.context) {
        accumulated_inputs.aiming = true;
    }
}

fn apply_fire(fire: On<Fire<FireWeapon>>, mut accumulated_inputs: Query<&mut AccumulatedInput>) {
    if let Ok(mut accumulated_inputs) = accumulated_inputs.get_mut(fire.context) {
        accumulated_inputs.fired = true;
    }
}

fn clear_accumulated_input(mut accumulated_inputs: Query<&mut AccumulatedInput>) {
    for mut accumulated_input in &mut accumulated_inputs {
        let look = accumulated_input.look;
        *accumulated_input = AccumulatedInput {
            look,
            ..default()
        };
    }
}

fn clear_look_input(mut accumulated_inputs: Query<&mut AccumulatedInput>) {
    for mut accumulated_input in &mut accumulated_inputs {
        accumulated_input.look = Vec2::ZERO;
    }
}
