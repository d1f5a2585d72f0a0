use bevy_ecs::{
    intern::Interned, lifecycle::HookContext, schedule::ScheduleLabel, world::DeferredWorld,
};
use tracing::debug;

use crate::{
    input::AccumulatedInput,
    locomotion::smoothing,
    prelude::*,
    viewmodel::{ShotFired, ShotHit, Weapon, WeaponOf, Weapons},
};

pub(super) fn plugin(schedule: Interned<dyn ScheduleLabel>) -> impl Fn(&mut App) {
    move |app: &mut App| {
        app.add_systems(
            RunFixedMainLoop,
            update_aim.in_set(RunFixedMainLoopSystems::BeforeFixedMainLoop),
        )
        .add_systems(schedule, fire.in_set(VantageSystems::Weapons));
    }
}

/// Tuning for a hitscan weapon with an aim-down-sights transition. Spawn
/// with a [`WeaponOf`] handle to the controller; runtime values live in
/// [`HitscanWeaponState`]. The smoothed FOV is published there rather than
/// written into a projection, since rendering is not this crate's concern.
#[derive(Component, Clone, Reflect, Debug)]
#[reflect(Component)]
#[require(HitscanWeaponState, Transform)]
#[component(on_add = HitscanWeapon::on_add)]
pub struct HitscanWeapon {
    pub damage: f32,
    /// Maximum hitscan distance in meters.
    pub range: f32,
    /// Aim blend change per second; 1/aim_speed seconds for a full transition.
    pub aim_speed: f32,
    /// Local pose at the hip.
    pub hip_pose: Transform,
    /// Local pose while fully aimed.
    pub aim_pose: Transform,
    /// Camera field of view in degrees while fully aimed.
    pub zoom_fov: f32,
    /// Camera field of view in degrees at the hip.
    pub normal_fov: f32,
    /// Exponential rate of the FOV transition.
    pub fov_rate: f32,
}

impl Default for HitscanWeapon {
    fn default() -> Self {
        Self {
            damage: 100.0,
            range: 100.0,
            aim_speed: 10.0,
            hip_pose: Transform::from_xyz(0.2, -0.15, -0.45),
            aim_pose: Transform::from_xyz(0.0, -0.1, -0.3),
            zoom_fov: 40.0,
            normal_fov: 60.0,
            fov_rate: 10.0,
        }
    }
}

impl HitscanWeapon {
    fn on_add(mut world: DeferredWorld, ctx: HookContext) {
        let Some(weapon) = world.get::<Self>(ctx.entity) else {
            return;
        };
        let normal_fov = weapon.normal_fov;
        let Some(mut state) = world.get_mut::<HitscanWeaponState>(ctx.entity) else {
            return;
        };
        state.fov = normal_fov;
    }
}

/// Runtime aim state. Owned by [`update_aim`]; the sway animator and
/// whatever applies the FOV only read it.
#[derive(Component, Clone, Reflect, Default, Debug)]
#[reflect(Component)]
pub struct HitscanWeaponState {
    /// Hip/Aiming state; entered on aim press, left on release.
    pub aiming: bool,
    /// Blend between the hip pose (0) and the aim pose (1).
    pub aim_blend: f32,
    /// Current smoothed field of view in degrees. Seeded from
    /// [`HitscanWeapon::normal_fov`] when the weapon is added.
    pub fov: f32,
}

impl Weapon for HitscanWeaponState {
    fn is_aiming(&self) -> bool {
        self.aiming
    }
}

/// One step of the aim blend. Always advances toward the current state, so
/// releasing mid-transition eases back from wherever the blend was.
fn advance_aim_blend(blend: f32, aiming: bool, aim_speed: f32, dt: f32) -> f32 {
    let direction = if aiming { 1.0 } else { -1.0 };
    (blend + direction * aim_speed * dt).clamp(0.0, 1.0)
}

fn blend_pose(hip: &Transform, aim: &Transform, blend: f32) -> Transform {
    Transform {
        translation: hip.translation.lerp(aim.translation, blend),
        rotation: hip.rotation.slerp(aim.rotation, blend),
        scale: hip.scale.lerp(aim.scale, blend),
    }
}

/// Runs every frame regardless of transitions, so the pose and FOV keep
/// easing toward the current aim state.
fn update_aim(
    mut weapons: Query<(
        &HitscanWeapon,
        &mut HitscanWeaponState,
        &mut Transform,
        &WeaponOf,
    )>,
    inputs: Query<&AccumulatedInput>,
    time: Res<Time>,
) {
    let dt = time.delta_secs();
    for (weapon, mut state, mut transform, weapon_of) in &mut weapons {
        let aiming = inputs
            .get(weapon_of.0)
            .map(|input| input.aiming)
            .unwrap_or(false);
        state.aiming = aiming;
        state.aim_blend = advance_aim_blend(state.aim_blend, aiming, weapon.aim_speed, dt);
        *transform = blend_pose(&weapon.hip_pose, &weapon.aim_pose, state.aim_blend);

        let target_fov = if aiming {
            weapon.zoom_fov
        } else {
            weapon.normal_fov
        };
        state.fov = state.fov.lerp(target_fov, smoothing(weapon.fov_rate, dt));
    }
}

fn resolve_hit(hit: Option<RayHitData>) -> Option<ShotHit> {
    hit.map(|hit| ShotHit {
        entity: hit.entity,
        distance: hit.distance,
    })
}

/// Discharges queued fire inputs: one forward ray from the camera per
/// related weapon, out to its range. Works from the hip or while aiming; a
/// miss still reports the shot, just without a hit identity.
fn fire(
    mut controllers: Query<(
        Entity,
        &FirstPersonController,
        &mut AccumulatedInput,
        Option<&FirstPersonCamera>,
        Option<&Weapons>,
    )>,
    camera_transforms: Query<&Transform>,
    weapons: Query<&HitscanWeapon>,
    spatial_query: SpatialQuery,
    mut shots: MessageWriter<ShotFired>,
) {
    for (shooter, cfg, mut input, camera, related_weapons) in &mut controllers {
        if !std::mem::take(&mut input.fired) {
            continue;
        }
        // Missing camera was reported at setup; firing is among the features it disables.
        let Some(camera) = camera else {
            continue;
        };
        let Ok(camera_transform) = camera_transforms.get(camera.get()) else {
            continue;
        };
        let Some(related_weapons) = related_weapons else {
            continue;
        };
        for weapon_entity in related_weapons.iter() {
            let Ok(weapon) = weapons.get(weapon_entity) else {
                continue;
            };
            let hit = spatial_query.cast_ray(
                camera_transform.translation,
                camera_transform.forward(),
                weapon.range,
                true,
                &cfg.filter,
            );
            if let Some(hit) = &hit {
                debug!("shot from {shooter} hit {} at {} m", hit.entity, hit.distance);
            }
            shots.write(ShotFired {
                weapon: weapon_entity,
                shooter,
                hit: resolve_hit(hit),
            });
        }
    }
}
