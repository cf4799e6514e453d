use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

use inventory_console::models::{
    Availability, Resource, ResourceCategory, ResourceId, ResourceType, ResourceTypeId, SubCategory,
    SubCategoryId, TypeCatalog,
};
use inventory_console::tree::TreeBuilder;

fn lcg_next(state: &mut u64) -> u64 {
    *state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
    *state
}

fn resource_type(id: i32, category: ResourceCategory, singleton: bool, sub_category: Option<i32>) -> ResourceType {
    ResourceType {
        id: ResourceTypeId(id),
        name: format!("Type {id}"),
        plugin: "Bench".to_string(),
        category,
        description: None,
        singleton,
        sub_category_id: sub_category.map(SubCategoryId),
        child_type_ids: Vec::new(),
    }
}

fn catalog() -> TypeCatalog {
    let types = vec![
        resource_type(1, ResourceCategory::Platform, false, None),
        resource_type(2, ResourceCategory::Server, false, Some(1)),
        resource_type(3, ResourceCategory::Service, false, Some(2)),
        resource_type(4, ResourceCategory::Service, true, Some(3)),
        resource_type(5, ResourceCategory::Service, false, None),
    ];
    let sub_categories = vec![
        SubCategory {
            id: SubCategoryId(1),
            name: "Servers".to_string(),
            parent_id: None,
        },
        SubCategory {
            id: SubCategoryId(2),
            name: "Subsystems".to_string(),
            parent_id: None,
        },
        SubCategory {
            id: SubCategoryId(3),
            name: "Datasources".to_string(),
            parent_id: Some(SubCategoryId(2)),
        },
    ];
    TypeCatalog::with_types(types, sub_categories)
}

/// A platform-rooted inventory where every non-root picks a random earlier
/// resource as parent, shuffled so the builder has to reorder it.
fn synthetic_inventory(count: usize) -> Vec<Resource> {
    let mut state = 0x1234_5678_9abc_def0u64;
    let mut resources: Vec<Resource> = (0..count)
        .map(|idx| {
            let id = ResourceId(idx as i32 + 1);
            let (parent_id, type_id) = if idx % 200 == 0 {
                (None, 1)
            } else {
                let parent = (lcg_next(&mut state) as usize) % idx;
                (Some(ResourceId(parent as i32 + 1)), 2 + (lcg_next(&mut state) % 4) as i32)
            };
            Resource {
                id,
                name: format!("resource-{idx}"),
                description: None,
                parent_id,
                type_id: ResourceTypeId(type_id),
                availability: Availability::Up,
                ancestry: None,
            }
        })
        .collect();

    for idx in (1..resources.len()).rev() {
        let swap = (lcg_next(&mut state) as usize) % (idx + 1);
        resources.swap(idx, swap);
    }
    resources
}

fn bench_resource_tree(c: &mut Criterion) {
    let catalog = catalog();
    let mut group = c.benchmark_group("resource_tree");
    for count in [1_000usize, 10_000usize] {
        let resources = synthetic_inventory(count);

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(
            BenchmarkId::new("build", format!("{count}r")),
            &resources,
            |b, resources| {
                b.iter(|| black_box(TreeBuilder::new(&catalog).build(resources)));
            },
        );
    }
    group.finish();
}

criterion_group!(tree_build, bench_resource_tree);
criterion_main!(tree_build);
