//! Scoped ownership of GPU resource handles.
//!
//! Every resource role the renderer needs (programs, images) lives in its own
//! [`ResourceSlot`]. A slot holds at most one live handle. Replacing the
//! handle always releases the previous one before the new one is created, so
//! no code path can hold two generations of a role at once, leak the old one,
//! or release it twice.

use std::convert::Infallible;
use std::fmt;

/// The role a GPU resource plays for the renderer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceRole {
    RaymarchProgram,
    PresentProgram,
    RenderTarget,
    VolumeImage,
    TransferFunctionImage,
}

impl fmt::Display for ResourceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::RaymarchProgram => "ray-march program",
            Self::PresentProgram => "present program",
            Self::RenderTarget => "render target",
            Self::VolumeImage => "volume image",
            Self::TransferFunctionImage => "transfer-function image",
        };
        f.write_str(name)
    }
}

/// A GPU handle that must be explicitly destroyed.
pub trait GpuResource {
    /// Free the underlying GPU memory. Called exactly once per handle.
    fn release(self);
}

/// Hands out monotonically increasing acquisition stamps.
#[derive(Debug, Default)]
pub struct AcquisitionClock {
    next: u64,
}

impl AcquisitionClock {
    pub fn new() -> Self {
        Self::default()
    }

    fn tick(&mut self) -> u64 {
        self.next += 1;
        self.next
    }
}

/// Owner of the current handle for one [`ResourceRole`].
pub struct ResourceSlot<T: GpuResource> {
    role: ResourceRole,
    current: Option<T>,
    generation: u64,
    acquired_at: u64,
}

impl<T: GpuResource> ResourceSlot<T> {
    pub fn new(role: ResourceRole) -> Self {
        Self {
            role,
            current: None,
            generation: 0,
            acquired_at: 0,
        }
    }

    pub fn role(&self) -> ResourceRole {
        self.role
    }

    /// Number of handles this slot has held so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn get(&self) -> Option<&T> {
        self.current.as_ref()
    }

    pub fn get_mut(&mut self) -> Option<&mut T> {
        self.current.as_mut()
    }

    pub fn is_live(&self) -> bool {
        self.current.is_some()
    }

    /// Release the current handle, then install the one `create` builds.
    ///
    /// If `create` fails the slot is left empty and the error is returned.
    pub fn recreate<E>(
        &mut self,
        clock: &mut AcquisitionClock,
        create: impl FnOnce() -> Result<T, E>,
    ) -> Result<&T, E> {
        self.release();
        let resource = create()?;
        self.generation += 1;
        self.acquired_at = clock.tick();
        log::debug!("acquired {} (generation {})", self.role, self.generation);
        Ok(self.current.insert(resource))
    }

    /// [`recreate`](Self::recreate) for resources whose creation cannot fail.
    pub fn replace(&mut self, clock: &mut AcquisitionClock, create: impl FnOnce() -> T) -> &T {
        match self.recreate(clock, || Ok::<T, Infallible>(create())) {
            Ok(resource) => resource,
            Err(never) => match never {},
        }
    }

    /// Destroy the current handle, if any.
    pub fn release(&mut self) {
        if let Some(old) = self.current.take() {
            log::debug!("releasing {} (generation {})", self.role, self.generation);
            old.release();
        }
    }
}

impl<T: GpuResource> Drop for ResourceSlot<T> {
    fn drop(&mut self) {
        self.release();
    }
}

/// Type-erased view of a slot used for ordered teardown.
pub trait Teardown {
    fn role(&self) -> ResourceRole;
    /// Stamp of the live handle's acquisition, `None` if the slot is empty.
    fn acquired_at(&self) -> Option<u64>;
    fn release(&mut self);
}

impl<T: GpuResource> Teardown for ResourceSlot<T> {
    fn role(&self) -> ResourceRole {
        self.role
    }

    fn acquired_at(&self) -> Option<u64> {
        self.current.as_ref().map(|_| self.acquired_at)
    }

    fn release(&mut self) {
        ResourceSlot::release(self);
    }
}

/// Release every live slot, most recently acquired first.
///
/// Returns the roles in the order they were released.
pub fn teardown(slots: &mut [&mut dyn Teardown]) -> Vec<ResourceRole> {
    let mut live: Vec<_> = slots
        .iter_mut()
        .filter_map(|slot| slot.acquired_at().map(|stamp| (stamp, slot)))
        .collect();
    live.sort_by(|a, b| b.0.cmp(&a.0));

    live.into_iter()
        .map(|(_, slot)| {
            slot.release();
            slot.role()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Journal = Rc<RefCell<Vec<String>>>;

    struct Fake {
        name: String,
        journal: Journal,
    }

    impl Fake {
        fn create(name: &str, journal: &Journal) -> Result<Self, ()> {
            journal.borrow_mut().push(format!("create {name}"));
            Ok(Self {
                name: name.to_string(),
                journal: Rc::clone(journal),
            })
        }
    }

    impl GpuResource for Fake {
        fn release(self) {
            self.journal.borrow_mut().push(format!("release {}", self.name));
        }
    }

    #[test]
    fn recreate_releases_before_creating() {
        let journal = Journal::default();
        let mut clock = AcquisitionClock::new();
        let mut slot = ResourceSlot::new(ResourceRole::RenderTarget);

        slot.recreate(&mut clock, || Fake::create("a", &journal)).unwrap();
        slot.replace(&mut clock, || Fake::create("b", &journal).unwrap());

        assert_eq!(*journal.borrow(), ["create a", "release a", "create b"]);
        assert_eq!(slot.generation(), 2);
        assert_eq!(slot.get().map(|f| f.name.as_str()), Some("b"));
    }

    #[test]
    fn failed_creation_leaves_slot_empty() {
        let journal = Journal::default();
        let mut clock = AcquisitionClock::new();
        let mut slot = ResourceSlot::new(ResourceRole::VolumeImage);

        slot.recreate(&mut clock, || Fake::create("a", &journal)).unwrap();
        let result = slot.recreate(&mut clock, || Err::<Fake, _>("boom"));

        assert_eq!(result.err(), Some("boom"));
        assert!(!slot.is_live());
        assert_eq!(slot.generation(), 1);
        assert_eq!(*journal.borrow(), ["create a", "release a"]);
    }

    #[test]
    fn release_is_idempotent() {
        let journal = Journal::default();
        let mut clock = AcquisitionClock::new();
        let mut slot = ResourceSlot::new(ResourceRole::VolumeImage);
        slot.recreate(&mut clock, || Fake::create("a", &journal)).unwrap();

        slot.release();
        slot.release();
        drop(slot);

        assert_eq!(*journal.borrow(), ["create a", "release a"]);
    }

    #[test]
    fn drop_releases_live_handle() {
        let journal = Journal::default();
        let mut clock = AcquisitionClock::new();
        {
            let mut slot = ResourceSlot::new(ResourceRole::PresentProgram);
            slot.recreate(&mut clock, || Fake::create("p", &journal)).unwrap();
        }
        assert_eq!(*journal.borrow(), ["create p", "release p"]);
    }

    #[test]
    fn teardown_is_reverse_acquisition_order() {
        let journal = Journal::default();
        let mut clock = AcquisitionClock::new();
        let mut program = ResourceSlot::new(ResourceRole::RaymarchProgram);
        let mut target = ResourceSlot::new(ResourceRole::RenderTarget);
        let mut volume = ResourceSlot::new(ResourceRole::VolumeImage);
        let mut empty: ResourceSlot<Fake> = ResourceSlot::new(ResourceRole::TransferFunctionImage);

        program.recreate(&mut clock, || Fake::create("program", &journal)).unwrap();
        target.recreate(&mut clock, || Fake::create("target", &journal)).unwrap();
        volume.recreate(&mut clock, || Fake::create("volume", &journal)).unwrap();
        // a resize re-acquires the target after the volume
        target.recreate(&mut clock, || Fake::create("target2", &journal)).unwrap();
        journal.borrow_mut().clear();

        let order = teardown(&mut [&mut program, &mut target, &mut volume, &mut empty]);

        assert_eq!(
            order,
            [
                ResourceRole::RenderTarget,
                ResourceRole::VolumeImage,
                ResourceRole::RaymarchProgram
            ]
        );
        assert_eq!(
            *journal.borrow(),
            ["release target2", "release volume", "release program"]
        );
        assert!(!program.is_live() && !target.is_live() && !volume.is_live());
    }
}
