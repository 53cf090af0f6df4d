//! Component-universe capacity limits.
//!
//! Lives in its own binary so filling the registry does not starve the
//! other test suites, which share a process-wide component universe per
//! binary.

use archetable::{
    register_component, ComponentId, RegistryError, World, WorldError, WorldResult,
    COMPONENT_CAP,
};

macro_rules! filler_components {
    ($($name:ident),* $(,)?) => {
        $( struct $name(#[allow(dead_code)] u64); )*

        fn register_fillers() -> Vec<WorldResult<ComponentId>> {
            vec![ $( register_component::<$name>(), )* ]
        }
    };
}

// Exactly COMPONENT_CAP distinct types.
filler_components!(
    C00, C01, C02, C03, C04, C05, C06, C07, C08, C09, C10, C11, C12, C13, C14, C15, C16, C17,
    C18, C19, C20, C21, C22, C23, C24, C25, C26, C27, C28, C29, C30, C31, C32, C33, C34, C35,
    C36, C37, C38, C39, C40, C41, C42, C43, C44, C45, C46, C47, C48, C49, C50, C51, C52, C53,
    C54, C55, C56, C57, C58, C59, C60, C61, C62, C63,
);

struct Overflow(#[allow(dead_code)] u64);

#[test]
fn universe_fills_at_capacity_and_then_rejects() {
    let results = register_fillers();
    assert_eq!(results.len(), COMPONENT_CAP);

    let mut ids: Vec<ComponentId> = results.into_iter().map(|r| r.unwrap()).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), COMPONENT_CAP, "ids must be distinct");
    assert!(ids.iter().all(|&id| (id as usize) < COMPONENT_CAP));

    let err = register_component::<Overflow>().unwrap_err();
    assert_eq!(
        err,
        WorldError::Registry(RegistryError::UniverseFull { cap: COMPONENT_CAP })
    );

    // Spawning a row that would mint a new id fails the same way.
    let mut world = World::new();
    let err = world.spawn((Overflow(1),)).unwrap_err();
    assert_eq!(
        err,
        WorldError::Registry(RegistryError::UniverseFull { cap: COMPONENT_CAP })
    );
    assert!(world.is_empty());

    // Already-registered types keep working at the brim.
    assert!(register_component::<C00>().is_ok());
    let id = world.spawn((C00(7), C63(8))).unwrap();
    assert!(world.is_alive(id));
}

#[test]
fn zero_sized_components_are_rejected_without_minting_ids() {
    struct Marker;

    let err = register_component::<Marker>().unwrap_err();
    assert!(matches!(
        err,
        WorldError::Registry(RegistryError::ZeroSized { .. })
    ));
}
