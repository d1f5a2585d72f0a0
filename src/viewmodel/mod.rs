//! First-person weapon view-model: sway/bob animation and the aim/fire
//! controller. View-model and weapon entities hold explicit handles to their
//! controller ([`ViewmodelOf`], [`WeaponOf`]); there is no global lookup.

use bevy_ecs::{intern::Interned, schedule::ScheduleLabel};

use crate::prelude::*;

pub mod sway_bob;
pub mod weapon;

pub(super) fn plugin(schedule: Interned<dyn ScheduleLabel>) -> impl Fn(&mut App) {
    move |app: &mut App| {
        app.add_message::<ShotFired>().add_plugins((
            sway_bob::plugin::<weapon::HitscanWeaponState>,
            weapon::plugin(schedule),
        ));
    }
}

/// Capability the sway/bob animator needs from a weapon: nothing but whether
/// it is currently aimed. Implement this for custom weapon components and
/// register [`sway_bob::plugin`] for them.
pub trait Weapon: Component {
    fn is_aiming(&self) -> bool;
}

/// Handle from a view-model pivot entity to its controller.
#[derive(Component, Clone, Copy)]
#[relationship(relationship_target = Viewmodels)]
pub struct ViewmodelOf(pub Entity);

#[derive(Component)]
#[relationship_target(relationship = ViewmodelOf)]
pub struct Viewmodels(Vec<Entity>);

/// Handle from a weapon entity to its controller.
#[derive(Component, Clone, Copy)]
#[relationship(relationship_target = Weapons)]
pub struct WeaponOf(pub Entity);

#[derive(Component)]
#[relationship_target(relationship = WeaponOf)]
pub struct Weapons(Vec<Entity>);

/// Written for every discharged shot, hit or miss.
#[derive(Message, Debug, Clone, Copy)]
pub struct ShotFired {
    pub weapon: Entity,
    pub shooter: Entity,
    pub hit: Option<ShotHit>,
}

/// Identity of whatever the hitscan ray struck.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShotHit {
    pub entity: Entity,
    pub distance: f32,
}
