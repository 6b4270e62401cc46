use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use warden_auth::{
    AuthenticatedUser, Identity, IdentityClaims, RoutePrefixes, TenantMembership, TenantRole, check_route,
    decide_tenant_access,
};
use warden_core::{TenantId, UserId};

fn identity_with_memberships(count: usize) -> Identity {
    let memberships = (0..count)
        .map(|i| {
            TenantMembership::new(
                TenantId::new(format!("tenant-{i}")).expect("tenant id"),
                [TenantRole::User, TenantRole::Admin],
            )
        })
        .collect();
    Identity::User(AuthenticatedUser {
        user_id: UserId::new("bench-user").expect("user id"),
        email: None,
        email_verified: true,
        claims: IdentityClaims {
            tenant_memberships: memberships,
            ..IdentityClaims::default()
        },
        tenant_id: None,
    })
}

fn bench_route_classification(c: &mut Criterion) {
    let prefixes = RoutePrefixes::default();
    let paths = [
        "/api/v1/public/health",
        "/api/v1/users/123",
        "/admin-api/tenants/acme",
        "/superadmin-api/tokens",
        "/api/v1/orders/42/lines",
    ];

    c.bench_function("route_classify", |b| {
        b.iter(|| {
            for p in paths {
                black_box(prefixes.classify(black_box(p)));
            }
        })
    });
}

fn bench_route_check(c: &mut Criterion) {
    let mut group = c.benchmark_group("route_check");
    let prefixes = RoutePrefixes::default();
    let class = prefixes.classify("/admin-api/users");

    for memberships in [1, 10, 100].iter() {
        let identity = identity_with_memberships(*memberships);
        let last = TenantId::new(format!("tenant-{}", memberships - 1)).expect("tenant id");
        group.bench_with_input(BenchmarkId::from_parameter(memberships), memberships, |b, _| {
            b.iter(|| black_box(check_route(&identity, class, "POST", Some(&last))).is_ok())
        });
    }
    group.finish();
}

fn bench_tenant_access(c: &mut Criterion) {
    let mut group = c.benchmark_group("tenant_access");

    for memberships in [1, 10, 100].iter() {
        let identity = identity_with_memberships(*memberships);
        let outside = TenantId::new("not-a-member").expect("tenant id");
        group.bench_with_input(BenchmarkId::from_parameter(memberships), memberships, |b, _| {
            b.iter(|| black_box(decide_tenant_access(&identity, &outside, false)).is_err())
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_route_classification,
    bench_route_check,
    bench_tenant_access
);
criterion_main!(benches);
