use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

// ----------

use restive::{
	prelude::*,
	resource::{RegistrationError, _locator},
};

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

struct Root;
struct Level(usize);

impl Describe for Level {
	fn describe() -> Result<ResourceDescriptor, RegistrationError> {
		ResourceDescriptor::builder::<Level>()
			.method(_get(|level: &Level, _: &mut Args| level.0.to_string()))
			.sub_resource_method(
				"item/{id}",
				_get(|_: &Level, args: &mut Args| args.take::<String>()).param(Param::path::<String>("id")),
			)
			.sub_resource_locator(
				"level",
				_locator(|level: &Level, _: &mut Args| SubResource::new(Level(level.0 + 1))),
			)
			.build()
	}
}

fn launcher() -> ResourceLauncher {
	let resources = ResourceBinder::new();

	macro_rules! static_roots {
		($($name:ident: $template:literal),+) => {
			$(
				struct $name;

				resources
					.add_resource(
						ResourceDescriptor::root::<$name>($template)
							.singleton($name)
							.method(_get(|_: &$name, _: &mut Args| $template))
							.build()
							.expect("valid static root"),
					)
					.expect("unique static root");
			)+
		};
	}

	static_roots!(
		Login: "/login",
		Logout: "/logout",
		About: "/about",
		Products: "/products",
		Categories: "/categories"
	);

	resources
		.add_resource(
			ResourceDescriptor::root::<Root>("/root/{tenant}")
				.singleton(Root)
				.method(_get(|_: &Root, _: &mut Args| "root").produces(["text/plain"]))
				.method(_get(|_: &Root, _: &mut Args| "{}").produces(["application/json"]))
				.sub_resource_locator(
					"level",
					_locator(|_: &Root, _: &mut Args| SubResource::new(Level(1))),
				)
				.build()
				.expect("valid root"),
		)
		.expect("unique root");

	ResourceLauncher::new(RequestHandler::new(
		Arc::new(resources),
		Arc::new(ProviderBinder::new()),
	))
}

pub fn dispatch(c: &mut Criterion) {
	let launcher = launcher();

	let mut bench_group = c.benchmark_group("dispatch");

	bench_group.bench_function("root method", |b| {
		b.iter(|| {
			let response = launcher.service("GET", "/root/acme").unwrap();
			assert_eq!(response.status(), StatusCode::OK);
		})
	});

	bench_group.bench_function("negotiated root method", |b| {
		b.iter(|| {
			let response = launcher
				.request("GET", "/root/acme")
				.header("accept", "text/html;q=0.9, application/json")
				.send()
				.unwrap();

			assert_eq!(response.status(), StatusCode::OK);
		})
	});

	for depth in [1, 5, 10] {
		let path = format!("/root/acme{}/item/42", "/level".repeat(depth));

		bench_group.bench_function(BenchmarkId::new("locator depth", depth), |b| {
			b.iter(|| {
				let response = launcher.service("GET", &path).unwrap();
				assert_eq!(response.status(), StatusCode::OK);
			})
		});
	}

	bench_group.bench_function("not found", |b| {
		b.iter(|| {
			let response = launcher.service("GET", "/missing/path").unwrap();
			assert_eq!(response.status(), StatusCode::NOT_FOUND);
		})
	});

	bench_group.finish();
}

criterion_group!(benches, dispatch);
criterion_main!(benches);
