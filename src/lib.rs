#![doc = include_str!("../readme.md")]

/// Everything you need to get started with `bevy_vantage`
pub mod prelude {
    pub(crate) use {
        avian3d::prelude::*,
        bevy_app::prelude::*,
        bevy_derive::{Deref, DerefMut},
        bevy_ecs::prelude::*,
        bevy_enhanced_input::prelude::*,
        bevy_math::prelude::*,
        bevy_reflect::prelude::*,
        bevy_time::prelude::*,
        bevy_transform::prelude::*,
        bevy_utils::prelude::*,
    };

    pub use crate::{
        FirstPersonController, FirstPersonState, VantagePlugin, VantageSystems,
        camera::{FirstPersonCamera, FirstPersonCameraOf},
        input::{Aim, Crouch, FireWeapon, Jump, LeanLeft, LeanRight, Movement, RotateCamera, Sprint},
        viewmodel::{
            ShotFired, ShotHit, ViewmodelOf, Weapon, WeaponOf,
            sway_bob::{BobMode, SwayBob},
            weapon::{HitscanWeapon, HitscanWeaponState},
        },
    };
}

use crate::{input::AccumulatedInput, prelude::*};
use avian3d::parry::shape::{Capsule, SharedShape};
use bevy_ecs::{
    intern::Interned, lifecycle::HookContext, schedule::ScheduleLabel, world::DeferredWorld,
};
use std::sync::Arc;
use tracing::error;

pub mod camera;
mod fixed_update_utils;
mod ground;
pub mod input;
mod locomotion;
pub mod viewmodel;

/// Also requires you to add [`PhysicsPlugins`] and [`EnhancedInputPlugin`] to work properly.
pub struct VantagePlugin {
    schedule: Interned<dyn ScheduleLabel>,
}

impl VantagePlugin {
    /// Create a new plugin in the given schedule. The default is [`FixedPostUpdate`].
    pub fn new(schedule: impl ScheduleLabel) -> Self {
        Self {
            schedule: schedule.intern(),
        }
    }
}

impl Default for VantagePlugin {
    fn default() -> Self {
        Self {
            schedule: FixedPostUpdate.intern(),
        }
    }
}

impl Plugin for VantagePlugin {
    fn build(&self, app: &mut App) {
        app.configure_sets(
            self.schedule,
            (
                VantageSystems::GroundCheck,
                VantageSystems::Locomotion,
                VantageSystems::Weapons,
            )
                .chain()
                .before(PhysicsSystems::StepSimulation),
        )
        .add_systems(Update, report_missing_camera)
        .add_plugins((
            camera::plugin,
            input::plugin,
            ground::plugin(self.schedule),
            locomotion::plugin(self.schedule),
            viewmodel::plugin(self.schedule),
            fixed_update_utils::plugin,
        ));
    }
}

/// System sets used by all systems of `bevy_vantage`. Chained in this order
/// every simulation tick: the ground sensor must refresh before locomotion
/// consumes it, and weapons read the locomotion state published that tick.
#[derive(SystemSet, Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum VantageSystems {
    GroundCheck,
    Locomotion,
    Weapons,
}

/// Configuration for a first-person character. All tunables are flat numbers
/// supplied at spawn; runtime values live in [`FirstPersonState`].
#[derive(Component, Clone, Reflect, Debug)]
#[reflect(Component)]
#[require(
    AccumulatedInput,
    FirstPersonState,
    RigidBody = RigidBody::Kinematic,
    Collider = Collider::capsule(0.35, 1.1),
    Transform,
)]
#[component(on_add=FirstPersonController::on_add)]
pub struct FirstPersonController {
    /// Walking speed in m/s.
    pub move_speed: f32,
    /// Speed while the sprint input is held.
    pub sprint_speed: f32,
    /// Speed while crouched. Overrides sprint.
    pub crouch_speed: f32,
    /// Exponential rate at which the current speed approaches its target.
    pub speed_change_rate: f32,
    /// Apex height of a jump in meters.
    pub jump_height: f32,
    /// Vertical acceleration. Negative is down.
    pub gravity: f32,
    /// Seconds after a jump before another can trigger.
    pub jump_cooldown: f32,
    /// Vertical offset of the ground probe sphere from the character's feet.
    pub grounded_offset: f32,
    /// Radius of the ground probe sphere.
    pub grounded_radius: f32,
    /// Filter for the ground probe and fire raycasts.
    pub filter: SpatialQueryFilter,
    /// Look sensitivity applied to raw pointer deltas, in degrees per unit.
    pub look_sensitivity: f32,
    /// Highest allowed camera pitch in degrees.
    pub top_clamp: f32,
    /// Lowest allowed camera pitch in degrees.
    pub bottom_clamp: f32,
    /// Camera roll in degrees while a lean input is held.
    pub lean_angle: f32,
    /// Exponential rate at which the lean approaches its target.
    pub lean_speed: f32,
    /// Collider height while crouched.
    pub crouch_height: f32,
    /// Camera height above the character's feet while standing.
    pub standing_view_height: f32,
    /// Camera height above the character's feet while crouched.
    pub crouch_view_height: f32,
    /// Exponential rate at which the camera eases between view heights.
    pub view_height_rate: f32,
}

impl Default for FirstPersonController {
    fn default() -> Self {
        Self {
            move_speed: 5.0,
            sprint_speed: 9.0,
            crouch_speed: 2.5,
            speed_change_rate: 10.0,
            jump_height: 1.2,
            gravity: -15.0,
            jump_cooldown: 0.2,
            grounded_offset: -0.14,
            grounded_radius: 0.28,
            filter: SpatialQueryFilter::default(),
            look_sensitivity: 2.0,
            top_clamp: 80.0,
            bottom_clamp: -80.0,
            lean_angle: 15.0,
            lean_speed: 8.0,
            crouch_height: 1.3,
            standing_view_height: 1.7,
            crouch_view_height: 1.2,
            view_height_rate: 10.0,
        }
    }
}

impl FirstPersonController {
    pub fn on_add(mut world: DeferredWorld, ctx: HookContext) {
        {
            let Some(mut controller) = world.get_mut::<Self>(ctx.entity) else {
                return;
            };
            controller.filter.excluded_entities.insert(ctx.entity);
        }

        let (crouch_height, standing_view_height) = {
            let Some(controller) = world.get::<Self>(ctx.entity) else {
                return;
            };
            (controller.crouch_height, controller.standing_view_height)
        };

        let Some(collider) = world.entity(ctx.entity).get::<Collider>().cloned() else {
            return;
        };
        let standing_aabb = collider.aabb(default(), Rotation::default());
        let standing_height = standing_aabb.max.y - standing_aabb.min.y;

        let Some(mut state) = world.get_mut::<FirstPersonState>(ctx.entity) else {
            return;
        };
        state.view_height = standing_view_height;
        state.standing_collider = collider.clone();

        let mut crouching_collider = Collider::from(SharedShape(Arc::from(
            state.standing_collider.shape().clone_dyn(),
        )));

        if crouching_collider.shape().as_capsule().is_some() {
            let capsule = crouching_collider
                .shape_mut()
                .make_mut()
                .as_capsule_mut()
                .unwrap();
            let radius = capsule.radius;
            let new_height = (crouch_height - radius).max(0.0);
            *capsule = Capsule::new_y(new_height / 2.0, radius);
        } else {
            // note: well-behaved shapes like cylinders and cuboids will not actually subdivide when scaled, yay
            let frac = crouch_height / standing_height;
            crouching_collider.set_scale(vec3(1.0, frac, 1.0), 16);
        }
        // Recentered so the feet stay put when the capsule shrinks.
        state.crouching_collider = Collider::compound(vec![(
            Vec3::Y * (crouch_height - standing_height) / 2.0,
            Rotation::default(),
            crouching_collider,
        )]);
    }
}

/// Locomotion state published every tick. Owned by the locomotion systems;
/// the camera and weapon systems only read it.
#[derive(Component, Clone, Reflect, Default, Debug)]
#[reflect(Component)]
pub struct FirstPersonState {
    /// Vertical velocity in m/s. Negative is falling.
    pub vertical_velocity: f32,
    /// Smoothed horizontal speed in m/s.
    pub current_speed: f32,
    /// Whether the ground probe overlapped a walkable surface this tick.
    pub grounded: bool,
    /// Sprinting with directional input this tick.
    pub running: bool,
    pub crouching: bool,
    /// Seconds until another jump may trigger. Never negative.
    pub jump_cooldown: f32,
    /// Current lean roll in signed degrees.
    pub lean: f32,
    /// Accumulated camera pitch in degrees, clamped to the configured bounds.
    pub pitch: f32,
    /// Current camera height above the feet, eased toward the crouch state.
    pub view_height: f32,
    #[reflect(ignore)]
    pub standing_collider: Collider,
    #[reflect(ignore)]
    pub crouching_collider: Collider,
}

impl FirstPersonState {
    pub fn collider(&self) -> &Collider {
        if self.crouching {
            &self.crouching_collider
        } else {
            &self.standing_collider
        }
    }

    /// Height of the standing collider. Feet-relative measurements (ground
    /// probe, view height) are always taken against this, since the entity
    /// origin sits at the collider center.
    pub fn standing_height(&self) -> f32 {
        let aabb = self
            .standing_collider
            .aabb(Vec3::default(), Rotation::default());
        aabb.max.y - aabb.min.y
    }
}

/// A controller without a related camera can still move and look, but
/// nothing renders the view and firing has no ray origin. Report it once at
/// setup.
fn report_missing_camera(
    controllers: Query<Entity, Added<FirstPersonController>>,
    cameras: Query<&FirstPersonCamera>,
) {
    for entity in &controllers {
        if cameras.get(entity).is_err() {
            error!(
                "FirstPersonController {entity} has no FirstPersonCameraOf camera; \
                 firing is disabled"
            );
        }
    }
}
