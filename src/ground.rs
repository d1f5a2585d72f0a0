use bevy_ecs::{intern::Interned, schedule::ScheduleLabel};

use crate::prelude::*;

pub(super) fn plugin(schedule: Interned<dyn ScheduleLabel>) -> impl Fn(&mut App) {
    move |app: &mut App| {
        app.add_systems(schedule, update_grounded.in_set(VantageSystems::GroundCheck));
    }
}

/// Refreshes [`FirstPersonState::grounded`] with a sphere overlap just below
/// the character's feet. Runs before locomotion every tick; nothing else is
/// written. Trigger volumes ([`Sensor`]) never count as ground.
fn update_grounded(
    mut controllers: Query<(&FirstPersonController, &mut FirstPersonState, &Transform)>,
    spatial_query: SpatialQuery,
    sensors: Query<(), With<Sensor>>,
) {
    for (cfg, mut state, transform) in &mut controllers {
        let center = probe_center(
            transform.translation,
            state.standing_height(),
            cfg.grounded_offset,
        );
        let probe = Collider::sphere(cfg.grounded_radius);

        let mut grounded = false;
        spatial_query.shape_intersections_callback(
            &probe,
            center,
            Quat::IDENTITY,
            &cfg.filter,
            |entity| {
                if sensors.get(entity).is_ok() {
                    return true;
                }
                grounded = true;
                false
            },
        );
        state.grounded = grounded;
    }
}

/// Where the ground probe sits for a character at `position`.
/// `grounded_offset` is measured from the feet; the entity origin is the
/// collider center, so the standing height converts between the two.
fn probe_center(position: Vec3, standing_height: f32, grounded_offset: f32) -> Vec3 {
    position + Vec3::Y * (-standing_height / 2.0 + grounded_offset)
}
