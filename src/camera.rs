use crate::prelude::*;

pub(super) fn plugin(app: &mut App) {
    app.add_systems(
        RunFixedMainLoop,
        sync_camera_transform.in_set(RunFixedMainLoopSystems::AfterFixedMainLoop),
    )
    .add_observer(rotate_camera);
}

#[derive(Component, Clone, Copy)]
#[relationship(relationship_target = FirstPersonCamera)]
pub struct FirstPersonCameraOf(pub Entity);

#[derive(Component, Clone, Copy)]
#[relationship_target(relationship = FirstPersonCameraOf)]
pub struct FirstPersonCamera(Entity);

impl FirstPersonCamera {
    pub fn get(self) -> Entity {
        self.0
    }
}

/// Accumulate pitch from an already-scaled pointer delta, clamped to the
/// configured bounds in degrees.
fn accumulate_pitch(pitch: f32, delta_y: f32, bottom_clamp: f32, top_clamp: f32) -> f32 {
    (pitch - delta_y).clamp(bottom_clamp, top_clamp)
}

/// Look input: yaw turns the character itself, pitch only tilts the camera.
/// Pitch is accumulated (and clamped) here; the actual camera rotation is
/// composed in [`sync_camera_transform`].
fn rotate_camera(
    rotate: On<Fire<RotateCamera>>,
    mut controllers: Query<(
        &FirstPersonController,
        &mut FirstPersonState,
        &mut Transform,
    )>,
) {
    let Ok((cfg, mut state, mut transform)) = controllers.get_mut(rotate.context) else {
        return;
    };
    let delta = rotate.value * cfg.look_sensitivity;
    transform.rotate_y((-delta.x).to_radians());
    state.pitch = accumulate_pitch(state.pitch, delta.y, cfg.bottom_clamp, cfg.top_clamp);
}

/// Places the camera at the character's eased view height and composes its
/// rotation from body yaw, accumulated pitch, and lean roll. The roll term is
/// the lean pivot: it tilts the view without touching yaw or pitch.
pub(crate) fn sync_camera_transform(
    mut cameras: Query<(&mut Transform, &FirstPersonCameraOf), Without<FirstPersonState>>,
    controllers: Query<(&Transform, &FirstPersonState), With<FirstPersonController>>,
) {
    for (mut camera_transform, camera_of) in cameras.iter_mut() {
        if let Ok((body_transform, state)) = controllers.get(camera_of.0) {
            // changing the collider does not change the transform, so to get the correct position for the feet,
            // we need to use the collider we spawned with.
            let height = state.standing_height();
            camera_transform.translation =
                body_transform.translation + Vec3::Y * (-height / 2.0 + state.view_height);

            let (yaw, _, _) = body_transform.rotation.to_euler(EulerRot::YXZ);
            camera_transform.rotation = Quat::from_euler(
                EulerRot::YXZ,
                yaw,
                state.pitch.to_radians(),
                state.lean.to_radians(),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pitch_stays_inside_the_clamps() {
        let mut pitch = 0.0;
        for _ in 0..100 {
            pitch = accumulate_pitch(pitch, -7.3, -80.0, 80.0);
            assert!((-80.0..=80.0).contains(&pitch));
        }
        assert_eq!(pitch, 80.0);

        for _ in 0..100 {
            pitch = accumulate_pitch(pitch, 11.9, -80.0, 80.0);
            assert!((-80.0..=80.0).contains(&pitch));
        }
        assert_eq!(pitch, -80.0);
    }

    #[test]
    fn pitch_accumulates_inverted() {
        // Pointer up (negative delta after inversion) raises the view.
        assert_eq!(accumulate_pitch(0.0, -10.0, -80.0, 80.0), 10.0);
        assert_eq!(accumulate_pitch(10.0, 25.0, -80.0, 80.0), -15.0);
    }
}
