//! The registry of root resources.

// ----------

use std::{
	any::Any,
	sync::Arc,
	time::SystemTime,
};

use crate::{
	common::Registry,
	pattern::{UriPattern, UriTemplateError},
	resource::{ResourceDescriptor, ResourceId},
	ImplError,
};

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

// --------------------------------------------------
// ResourceListener trait

/// Notified when root resources are added to or removed from a [`ResourceBinder`].
pub trait ResourceListener: Send + Sync {
	fn resource_added(&self, descriptor: &ResourceDescriptor);

	fn resource_removed(&self, descriptor: &ResourceDescriptor);
}

// --------------------------------------------------
// ResourceBinder

/// The set of root resources.
///
/// Resources are kept in the order of their patterns' specificity, most specific
/// first. Dispatching reads a snapshot of the set, so resources can be added and
/// removed while requests are being served.
///
/// ```
/// use restive::{
/// 	binder::ResourceBinder,
/// 	resource::{_get, Args, ResourceDescriptor},
/// };
///
/// struct Hello;
///
/// let binder = ResourceBinder::new();
///
/// binder
/// 	.add_resource(
/// 		ResourceDescriptor::root::<Hello>("/hello")
/// 			.singleton(Hello)
/// 			.method(_get(|_: &Hello, _: &mut Args| "Hello!"))
/// 			.build()
/// 			.unwrap(),
/// 	)
/// 	.unwrap();
///
/// assert_eq!(binder.size(), 1);
/// ```
pub struct ResourceBinder {
	resources: Registry<Vec<Arc<ResourceDescriptor>>>,
	listeners: Registry<Vec<Arc<dyn ResourceListener>>>,
}

impl Default for ResourceBinder {
	fn default() -> Self {
		Self::new()
	}
}

impl ResourceBinder {
	pub fn new() -> Self {
		Self {
			resources: Registry::new(Vec::new()),
			listeners: Registry::new(Vec::new()),
		}
	}

	/// Adds the root resource.
	///
	/// Fails when the resource has no path template, when a resource of the same type
	/// is already registered, or when the pattern of an existing resource has the same
	/// structure, e.g., `/a/{x}` and `/a/{y}`. A failed addition leaves the binder
	/// unchanged.
	pub fn add_resource(&self, descriptor: ResourceDescriptor) -> Result<(), ResourcePublicationError> {
		let descriptor = Arc::new(descriptor);
		let Some(pattern) = descriptor.pattern() else {
			return Err(ResourcePublicationError::NotRoot(descriptor.id().type_name()));
		};

		self.resources.update(|resources| {
			for existing in resources.iter() {
				if existing.id() == descriptor.id() {
					return Err(ResourcePublicationError::AlreadyRegistered(
						descriptor.id().type_name(),
					));
				}

				if existing.pattern() == Some(pattern) {
					return Err(ResourcePublicationError::PatternCollision {
						template: pattern.template().into(),
						existing: existing.id().type_name(),
						rejected: descriptor.id().type_name(),
					});
				}
			}

			// Roots are ordered by `UriPattern`'s `Ord`: specificity, then the regex
			// string. Equally specific roots thus don't depend on the registration order,
			// unlike sub-resource methods and locators, which keep it.
			let position = resources
				.iter()
				.position(|existing| existing.pattern().is_some_and(|existing| pattern < existing))
				.unwrap_or(resources.len());

			resources.insert(position, descriptor.clone());

			Ok(())
		})
		.inspect_err(|error| tracing::warn!("resource publication failed: {}", error))?;

		tracing::info!(
			resource = %descriptor.id(),
			"resource added at {}",
			pattern.template()
		);

		self.notify(|listener| listener.resource_added(&descriptor));

		Ok(())
	}

	/// Adds the root resource, logging the failure instead of returning it.
	pub fn bind(&self, descriptor: ResourceDescriptor) -> bool {
		self.add_resource(descriptor).is_ok()
	}

	/// Removes the resource of the type `T`.
	pub fn remove_resource<T: Any>(&self) -> Option<Arc<ResourceDescriptor>> {
		self.remove_resource_by_id(ResourceId::of::<T>())
	}

	pub fn remove_resource_by_id(&self, id: ResourceId) -> Option<Arc<ResourceDescriptor>> {
		self.remove_where(|descriptor| descriptor.id() == id)
	}

	/// Removes the resource whose pattern has the same structure as the `template`.
	pub fn remove_resource_at(&self, template: &str) -> Result<Option<Arc<ResourceDescriptor>>, UriTemplateError> {
		let pattern = UriPattern::compile(template)?;

		Ok(self.remove_where(|descriptor| descriptor.pattern() == Some(&pattern)))
	}

	/// Removes the resource of the type `T`. Returns `false` if there was none.
	pub fn unbind<T: Any>(&self) -> bool {
		self.remove_resource::<T>().is_some()
	}

	fn remove_where<F>(&self, predicate: F) -> Option<Arc<ResourceDescriptor>>
	where
		F: Fn(&ResourceDescriptor) -> bool,
	{
		let removed = self
			.resources
			.update(|resources| {
				let position = resources
					.iter()
					.position(|descriptor| predicate(descriptor))
					.ok_or(())?;

				Ok::<_, ()>(resources.remove(position))
			})
			.ok()?;

		tracing::info!(resource = %removed.id(), "resource removed");

		self.notify(|listener| listener.resource_removed(&removed));

		Some(removed)
	}

	/// Removes the resources that expired by the time `now` and returns their number.
	pub fn remove_expired(&self, now: SystemTime) -> usize {
		let removed = self
			.resources
			.update(|resources| {
				let (expired, alive) = resources
					.drain(..)
					.partition::<Vec<_>, _>(|descriptor| descriptor.is_expired(now));

				*resources = alive;

				Ok::<_, ()>(expired)
			})
			.unwrap_or_default();

		for descriptor in removed.iter() {
			tracing::info!(resource = %descriptor.id(), "expired resource removed");

			self.notify(|listener| listener.resource_removed(descriptor));
		}

		removed.len()
	}

	/// Removes all the resources.
	pub fn clear(&self) {
		let removed = self
			.resources
			.update(|resources| Ok::<_, ()>(std::mem::take(resources)))
			.unwrap_or_default();

		for descriptor in removed.iter() {
			self.notify(|listener| listener.resource_removed(descriptor));
		}
	}

	/// Returns the current snapshot of the root resources in the matching order.
	#[inline]
	pub fn resources(&self) -> Arc<Vec<Arc<ResourceDescriptor>>> {
		self.resources.load()
	}

	/// Returns the patterns of the root resources in the matching order.
	pub fn root_patterns(&self) -> Vec<UriPattern> {
		self
			.resources
			.load()
			.iter()
			.filter_map(|descriptor| descriptor.pattern().cloned())
			.collect()
	}

	#[inline]
	pub fn size(&self) -> usize {
		self.resources.load().len()
	}

	// -------------------------

	pub fn add_listener<L: ResourceListener + 'static>(&self, listener: L) {
		let _ = self.listeners.update(|listeners| {
			listeners.push(Arc::new(listener));

			Ok::<_, ()>(())
		});
	}

	fn notify<F: Fn(&dyn ResourceListener)>(&self, func: F) {
		for listener in self.listeners.load().iter() {
			func(listener.as_ref());
		}
	}
}

// --------------------------------------------------
// ResourcePublicationError

#[derive(Debug, ImplError)]
pub enum ResourcePublicationError {
	#[error("{0} has no path template and cannot be a root resource")]
	NotRoot(&'static str),
	#[error("{0} is already registered")]
	AlreadyRegistered(&'static str),
	#[error("{rejected}: the pattern of {template:?} collides with the pattern of {existing}")]
	PatternCollision {
		template: Box<str>,
		existing: &'static str,
		rejected: &'static str,
	},
}

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

#[cfg(test)]
mod test {
	use std::{
		sync::atomic::{AtomicUsize, Ordering},
		time::Duration,
	};

	use crate::resource::{_get, Args};

	use super::*;

	// --------------------------------------------------------------------------------
	// --------------------------------------------------------------------------------

	macro_rules! resources {
		($($name:ident),+) => {
			$(struct $name;)+
		};
	}

	resources!(A, B, C, D);

	fn descriptor<T: Any + Send + Sync>(template: &str, instance: T) -> ResourceDescriptor {
		ResourceDescriptor::root::<T>(template)
			.singleton(instance)
			.method(_get(|_: &T, _: &mut Args| ()))
			.build()
			.unwrap()
	}

	#[derive(Default)]
	struct Counter {
		added: AtomicUsize,
		removed: AtomicUsize,
	}

	impl ResourceListener for Arc<Counter> {
		fn resource_added(&self, _: &ResourceDescriptor) {
			self.added.fetch_add(1, Ordering::SeqCst);
		}

		fn resource_removed(&self, _: &ResourceDescriptor) {
			self.removed.fetch_add(1, Ordering::SeqCst);
		}
	}

	// --------------------------------------------------

	#[test]
	fn add_and_remove() {
		let binder = ResourceBinder::new();
		let counter = Arc::new(Counter::default());
		binder.add_listener(counter.clone());

		binder.add_resource(descriptor("/a/b/{x}", A)).unwrap();
		binder.add_resource(descriptor("/a/b/c", B)).unwrap();
		binder.add_resource(descriptor("/", C)).unwrap();

		assert_eq!(binder.size(), 3);

		let templates = binder
			.root_patterns()
			.iter()
			.map(|pattern| pattern.template().to_owned())
			.collect::<Vec<_>>();

		assert_eq!(templates, ["/a/b/c", "/a/b/{x}", "/"]);

		let result = binder.add_resource(descriptor("/a/b/{y}/", D));
		assert!(matches!(
			result,
			Err(ResourcePublicationError::PatternCollision { existing, .. })
				if existing == std::any::type_name::<A>()
		));

		let result = binder.add_resource(descriptor("/d", A));
		assert!(matches!(result, Err(ResourcePublicationError::AlreadyRegistered(_))));
		assert_eq!(binder.size(), 3);

		assert!(binder.unbind::<A>());
		assert!(!binder.unbind::<A>());
		assert_eq!(binder.size(), 2);

		let removed = binder.remove_resource_at("a/b/c/").unwrap().unwrap();
		assert_eq!(removed.id(), ResourceId::of::<B>());
		assert!(binder.remove_resource_at("/x").unwrap().is_none());

		binder.clear();
		assert_eq!(binder.size(), 0);

		assert_eq!(counter.added.load(Ordering::SeqCst), 3);
		assert_eq!(counter.removed.load(Ordering::SeqCst), 3);
	}

	#[test]
	fn equally_specific_roots() {
		let cases = [[("/b/{x}", 0), ("/a/{y}", 1)], [("/a/{y}", 1), ("/b/{x}", 0)]];

		for case in cases {
			dbg!(&case);

			let binder = ResourceBinder::new();
			for (template, index) in case {
				if index == 0 {
					binder.add_resource(descriptor(template, A)).unwrap();
				} else {
					binder.add_resource(descriptor(template, B)).unwrap();
				}
			}

			let templates = binder
				.root_patterns()
				.iter()
				.map(|pattern| pattern.template().to_owned())
				.collect::<Vec<_>>();

			// The regex string breaks the tie whatever the registration order.
			assert_eq!(templates, ["/a/{y}", "/b/{x}"]);
		}
	}

	#[test]
	fn sibling_collision() {
		let binder = ResourceBinder::new();

		assert!(binder.bind(descriptor("/a/b/c/{d}/e", A)));
		assert!(!binder.bind(descriptor("/a/b/c/{d}/e", B)));
		assert_eq!(binder.size(), 1);
	}

	#[test]
	fn not_root() {
		let binder = ResourceBinder::new();
		let descriptor = ResourceDescriptor::builder::<A>()
			.method(_get(|_: &A, _: &mut Args| ()))
			.build()
			.unwrap();

		assert!(matches!(
			binder.add_resource(descriptor),
			Err(ResourcePublicationError::NotRoot(_))
		));
	}

	#[test]
	fn remove_expired() {
		let binder = ResourceBinder::new();
		let now = SystemTime::now();

		binder
			.add_resource(
				ResourceDescriptor::root::<A>("/a")
					.singleton(A)
					.method(_get(|_: &A, _: &mut Args| ()))
					.expires_at(now - Duration::from_secs(1))
					.build()
					.unwrap(),
			)
			.unwrap();

		binder.add_resource(descriptor("/b", B)).unwrap();

		assert_eq!(binder.remove_expired(now), 1);
		assert_eq!(binder.size(), 1);
		assert_eq!(binder.resources()[0].id(), ResourceId::of::<B>());
	}
}
