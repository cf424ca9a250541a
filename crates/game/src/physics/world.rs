use std::collections::BTreeMap;
use std::sync::Mutex;

use glam::Vec2;
use rapier2d::prelude::*;

use super::{BodyHandle, BoxBody, CircleBody, Collider as ContactSide, CollisionCategory, Contact, Physics};

/// World units (pixels) per rapier length unit. Tolerances such as the
/// prediction distance and the corrective velocity scale with it.
const LENGTH_UNIT: Real = 64.0;

/// Categories a moving circle is pushed out of. Circle pairs only report
/// contacts.
const BLOCKERS: CollisionCategory = CollisionCategory::TILE
    .union(CollisionCategory::TILE_WALL)
    .union(CollisionCategory::TILE_VOID)
    .union(CollisionCategory::WORLD_BOUNDS);

fn groups(memberships: CollisionCategory, filter: CollisionCategory) -> InteractionGroups {
    InteractionGroups {
        memberships: Group::from_bits_truncate(memberships.bits() as u32),
        filter: Group::from_bits_truncate(filter.bits() as u32),
        ..InteractionGroups::all()
    }
}

fn vector(v: Vec2) -> Vector {
    Vector::new(v.x, v.y)
}

/// Collects the collision events of one step.
#[derive(Default)]
struct ContactCollector {
    started: Mutex<Vec<(ColliderHandle, ColliderHandle)>>,
}

impl ContactCollector {
    fn take(&self) -> Vec<(ColliderHandle, ColliderHandle)> {
        match self.started.lock() {
            Ok(mut started) => std::mem::take(&mut *started),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl EventHandler for ContactCollector {
    fn handle_collision_event(
        &self,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        event: CollisionEvent,
        _contact_pair: Option<&ContactPair>,
    ) {
        if let CollisionEvent::Started(a, b, _) = event {
            match self.started.lock() {
                Ok(mut started) => started.push((a, b)),
                Err(poisoned) => poisoned.into_inner().push((a, b)),
            }
        }
    }

    fn handle_contact_force_event(
        &self,
        _dt: Real,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        _contact_pair: &ContactPair,
        _total_force_magnitude: Real,
    ) {
    }
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    /// Absent for static boxes, which are bare colliders.
    body: Option<RigidBodyHandle>,
    collider: ColliderHandle,
    category: CollisionCategory,
}

/// Top-down rapier world without gravity. Circles are dynamic bodies driven by
/// their set velocity; boxes are fixed colliders.
pub struct PhysicsWorld {
    pipeline: PhysicsPipeline,
    integration_parameters: IntegrationParameters,
    islands: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    gravity: Vector,
    events: ContactCollector,
    entries: BTreeMap<BodyHandle, Entry>,
    next_handle: u32,
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicsWorld {
    pub fn new() -> Self {
        let mut integration_parameters = IntegrationParameters::default();
        integration_parameters.length_unit = LENGTH_UNIT;

        Self {
            pipeline: PhysicsPipeline::new(),
            integration_parameters,
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            gravity: Vector::new(0.0, 0.0),
            events: ContactCollector::default(),
            entries: BTreeMap::new(),
            next_handle: 0,
        }
    }

    fn allocate(&mut self) -> BodyHandle {
        let handle = BodyHandle(self.next_handle);
        self.next_handle += 1;
        handle
    }

    pub fn body_count(&self) -> usize {
        self.entries.len()
    }

    fn side(&self, collider: ColliderHandle) -> Option<ContactSide> {
        let handle = BodyHandle(self.colliders.get(collider)?.user_data as u32);
        let entry = self.entries.get(&handle)?;
        Some(ContactSide {
            body: handle,
            category: entry.category,
        })
    }
}

impl Physics for PhysicsWorld {
    fn add_circle(&mut self, body: CircleBody) -> BodyHandle {
        let handle = self.allocate();

        let rigid_body = RigidBodyBuilder::dynamic()
            .translation(vector(body.position))
            .linvel(vector(body.velocity))
            .lock_rotations()
            .can_sleep(false)
            .ccd_enabled(body.category.contains(CollisionCategory::BULLET))
            .build();
        let rigid_body = self.bodies.insert(rigid_body);

        let collider = ColliderBuilder::ball(body.radius)
            .sensor(body.sensor)
            .friction(0.0)
            .restitution(if body.restitution { 1.0 } else { 0.0 })
            .restitution_combine_rule(CoefficientCombineRule::Max)
            .collision_groups(groups(body.category, body.mask))
            .solver_groups(groups(body.category, body.mask & BLOCKERS))
            .active_events(ActiveEvents::COLLISION_EVENTS)
            .user_data(handle.0 as u128)
            .build();
        let collider = self
            .colliders
            .insert_with_parent(collider, rigid_body, &mut self.bodies);

        self.entries.insert(
            handle,
            Entry {
                body: Some(rigid_body),
                collider,
                category: body.category,
            },
        );
        handle
    }

    fn add_box(&mut self, body: BoxBody) -> BodyHandle {
        let handle = self.allocate();

        let collider = ColliderBuilder::cuboid(body.half_extents.x, body.half_extents.y)
            .translation(vector(body.center))
            .friction(0.0)
            .collision_groups(groups(body.category, body.mask))
            .solver_groups(groups(body.category, body.mask))
            .user_data(handle.0 as u128)
            .build();
        let collider = self.colliders.insert(collider);

        self.entries.insert(
            handle,
            Entry {
                body: None,
                collider,
                category: body.category,
            },
        );
        handle
    }

    fn remove(&mut self, body: BodyHandle) {
        let Some(entry) = self.entries.remove(&body) else {
            return;
        };
        match entry.body {
            Some(rigid_body) => {
                self.bodies.remove(
                    rigid_body,
                    &mut self.islands,
                    &mut self.colliders,
                    &mut self.impulse_joints,
                    &mut self.multibody_joints,
                    true,
                );
            }
            None => {
                self.colliders
                    .remove(entry.collider, &mut self.islands, &mut self.bodies, true);
            }
        }
    }

    fn set_velocity(&mut self, body: BodyHandle, velocity: Vec2) {
        let Some(rigid_body) = self.entries.get(&body).and_then(|e| e.body) else {
            return;
        };
        if let Some(rigid_body) = self.bodies.get_mut(rigid_body) {
            rigid_body.set_linvel(vector(velocity), true);
        }
    }

    fn position(&self, body: BodyHandle) -> Option<Vec2> {
        let entry = self.entries.get(&body)?;
        match entry.body {
            Some(rigid_body) => self.bodies.get(rigid_body).map(|b| {
                let t = b.translation();
                Vec2::new(t.x, t.y)
            }),
            None => self.colliders.get(entry.collider).map(|c| {
                let t = c.translation();
                Vec2::new(t.x, t.y)
            }),
        }
    }

    fn velocity(&self, body: BodyHandle) -> Option<Vec2> {
        let entry = self.entries.get(&body)?;
        match entry.body {
            Some(rigid_body) => self.bodies.get(rigid_body).map(|b| {
                let v = b.linvel();
                Vec2::new(v.x, v.y)
            }),
            None => Some(Vec2::ZERO),
        }
    }

    fn step(&mut self, dt: f32) -> Vec<Contact> {
        self.integration_parameters.dt = dt;
        self.integration_parameters.min_ccd_dt = dt / 100.0;

        self.pipeline.step(
            self.gravity,
            &self.integration_parameters,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            &(),
            &self.events,
        );

        self.events
            .take()
            .into_iter()
            .filter_map(|(a, b)| Some(Contact { a: self.side(a)?, b: self.side(b)? }))
            .collect()
    }
}
