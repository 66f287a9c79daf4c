//! The save / load / refresh engine.
//!
//! [`Mapper`] ties the other pieces together: it consults the
//! [`IdentityCache`] before touching the store, allocates ids for fresh
//! entities, flattens entities into documents on save, and rehydrates
//! documents into live entity graphs on load.
//!
//! The one ordering rule everything depends on: an entity is registered in
//! the identity cache *before* its reference fields are resolved. A
//! reference chain that leads back to an id already being loaded finds the
//! (not yet fully populated) instance in the cache and reuses it, so cyclic
//! graphs terminate without a visited-set, and a chain of any depth fetches
//! each distinct document at most once. Save relies on the same ordering:
//! a fresh entity's id is bound and registered before its references are
//! flattened, so cascaded saves of cyclic fresh graphs terminate too.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::debug;

use arena_store::{DocStore, Document};
use arena_types::DocId;

use crate::alloc::IdAllocator;
use crate::cache::IdentityCache;
use crate::entity::{Entity, EntityHandle, RefSlot};
use crate::error::{MapperError, MapperResult};
use crate::registry::TypeRegistry;

/// The object-document mapper engine.
///
/// One `Mapper` owns one identity cache; all callers in a process share the
/// mapper (and therefore the cache) to get identity-map semantics, or scope
/// a mapper per session for isolation. All operations are blocking and none
/// retries: store failures propagate unchanged to the caller.
pub struct Mapper {
    store: Arc<dyn DocStore>,
    registry: Arc<TypeRegistry>,
    cache: Arc<IdentityCache>,
    allocator: IdAllocator,
    /// Per-id gates serializing fetch-construct-register for concurrent
    /// loads of the same uncached id.
    in_flight: Mutex<HashMap<DocId, Arc<Mutex<()>>>>,
}

impl Mapper {
    /// Create a mapper with its own fresh identity cache.
    pub fn new(store: Arc<dyn DocStore>, registry: Arc<TypeRegistry>) -> Self {
        Self::with_cache(store, registry, Arc::new(IdentityCache::new()))
    }

    /// Create a mapper over an existing identity cache.
    pub fn with_cache(
        store: Arc<dyn DocStore>,
        registry: Arc<TypeRegistry>,
        cache: Arc<IdentityCache>,
    ) -> Self {
        let allocator = IdAllocator::new(Arc::clone(&store));
        Self {
            store,
            registry,
            cache,
            allocator,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// The identity cache backing this mapper.
    pub fn cache(&self) -> &Arc<IdentityCache> {
        &self.cache
    }

    /// The type registry backing this mapper.
    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// The underlying document store.
    pub fn store(&self) -> &Arc<dyn DocStore> {
        &self.store
    }

    /// Persist an entity, returning its document id.
    ///
    /// A fresh entity is assigned an id (type tag as basename), registered
    /// in the identity cache, and written as a new document; subsequent
    /// loads of that id return this very instance. An already-persisted
    /// entity overwrites its stored document, overlaying its declared
    /// fields onto the stored copy so unknown store-side keys survive.
    ///
    /// Referenced entities that were never saved are saved on the way (they
    /// need an id before it can be embedded); already-persisted references
    /// only contribute their id.
    ///
    /// A failed save after allocation may leave an allocated id with no
    /// document behind it; nothing is rolled back.
    pub fn save(&self, entity: &EntityHandle) -> MapperResult<DocId> {
        let id = match entity.id() {
            Some(id) => id,
            None => {
                let tag = entity.type_tag();
                let id = self.allocator.allocate(tag.as_str())?;
                entity.bind_id(id.clone());
                // Register before flattening: a reference cycle back to this
                // entity substitutes the id instead of saving it again.
                self.cache.register(&id, entity);
                debug!(id = %id, tag = %tag, "created entity");
                id
            }
        };
        let doc = self.flatten(entity, &id)?;
        self.store.put(&id, &doc)?;
        debug!(id = %id, "saved entity");
        Ok(id)
    }

    /// Return the live entity for `id`, loading it if necessary.
    ///
    /// A cache hit returns the registered instance unchanged, with no store
    /// access. On a miss the document is fetched, its type tag resolved
    /// through the registry, the entity constructed and registered, and its
    /// reference fields resolved recursively (each through this same
    /// cache-first path).
    pub fn load(&self, id: &DocId) -> MapperResult<EntityHandle> {
        if let Some(entity) = self.cache.lookup(id) {
            debug!(id = %id, "identity cache hit");
            return Ok(entity);
        }
        self.load_uncached(id)
    }

    /// Like [`load`](Self::load), but a cached instance is refreshed from
    /// the store before being returned — same instance, current fields.
    pub fn load_fresh(&self, id: &DocId) -> MapperResult<EntityHandle> {
        if let Some(entity) = self.cache.lookup(id) {
            self.refresh(&entity)?;
            return Ok(entity);
        }
        self.load_uncached(id)
    }

    /// Re-fetch an entity's document and overwrite its fields in place.
    ///
    /// The instance is mutated, never replaced, so every holder of a handle
    /// observes the update. Reference fields are re-resolved through the
    /// cache afterwards. A document that has meanwhile vanished from the
    /// store surfaces as [`MapperError::NotFound`], leaving the instance
    /// untouched.
    pub fn refresh(&self, entity: &EntityHandle) -> MapperResult<()> {
        let id = entity
            .id()
            .ok_or_else(|| MapperError::UnsavedEntity(entity.type_tag()))?;
        let doc = self
            .store
            .get(&id)?
            .ok_or_else(|| MapperError::NotFound(id.clone()))?;
        let tag = doc
            .type_tag()
            .ok_or_else(|| MapperError::UntaggedDocument(id.clone()))?;
        if tag != entity.type_tag() {
            return Err(MapperError::TypeMismatch {
                expected: entity.type_tag(),
                actual: tag,
            });
        }
        debug!(id = %id, "refreshing entity from store");
        entity.apply_document(&doc);
        self.resolve_references(entity)
    }

    /// Drop the cached instance for `id`, returning `true` if one existed.
    ///
    /// The next load constructs a new instance; handles to the evicted one
    /// keep working but are no longer identity-linked to future loads.
    pub fn evict(&self, id: &DocId) -> bool {
        self.cache.evict(id)
    }

    // -- load internals -----------------------------------------------------

    fn load_uncached(&self, id: &DocId) -> MapperResult<EntityHandle> {
        let gate = self.load_gate(id);
        let result = {
            let _held = gate.lock().expect("lock poisoned");
            // Re-check under the gate: another loader may have won the race
            // while this one waited.
            match self.cache.lookup(id) {
                Some(entity) => {
                    debug!(id = %id, "lost load race, reusing registered instance");
                    Ok(entity)
                }
                None => self.fetch_construct_resolve(id),
            }
        };
        self.drop_load_gate(id, gate);
        result
    }

    fn fetch_construct_resolve(&self, id: &DocId) -> MapperResult<EntityHandle> {
        let doc = self
            .store
            .get(id)?
            .ok_or_else(|| MapperError::NotFound(id.clone()))?;
        let tag = doc
            .type_tag()
            .ok_or_else(|| MapperError::UntaggedDocument(id.clone()))?;
        let descriptor = self.registry.resolve(&tag)?;
        let entity = Entity::from_document(descriptor, &doc);
        entity.bind_id(id.clone());
        // Register before resolving references; this ordering is what makes
        // cyclic reference graphs terminate.
        let entity = self.cache.register_or_existing(id, &entity);
        debug!(id = %id, tag = %tag, "constructed entity from document");
        self.resolve_references(&entity)?;
        Ok(entity)
    }

    /// Replace every unresolved `Raw` slot with a live handle, loading the
    /// referenced id through the cache-first path.
    fn resolve_references(&self, entity: &EntityHandle) -> MapperResult<()> {
        let descriptor = Arc::clone(entity.descriptor());
        for field in descriptor.reference_fields() {
            if let Some(RefSlot::Raw(ref_id)) = entity.reference_slot(field) {
                let target = self.load(&ref_id)?;
                entity.install_reference(field, RefSlot::Resolved(target));
            }
        }
        for field in descriptor.reference_list_fields() {
            let Some(slots) = entity.reference_list_slots(field) else {
                continue;
            };
            if !slots.iter().any(|slot| matches!(slot, RefSlot::Raw(_))) {
                continue;
            }
            let mut resolved = Vec::with_capacity(slots.len());
            for slot in slots {
                resolved.push(match slot {
                    RefSlot::Raw(ref_id) => RefSlot::Resolved(self.load(&ref_id)?),
                    slot @ RefSlot::Resolved(_) => slot,
                });
            }
            entity.install_reference_list(field, resolved);
        }
        Ok(())
    }

    // -- save internals -----------------------------------------------------

    /// Flatten an entity into its document, overlaying onto the stored copy
    /// when one exists so unknown store-side keys survive the write.
    fn flatten(&self, entity: &EntityHandle, id: &DocId) -> MapperResult<Document> {
        let tag = entity.type_tag();
        let mut doc = match self.store.get(id)? {
            Some(mut existing) => {
                existing.set_type_tag(&tag);
                existing
            }
            None => Document::new(&tag),
        };

        let descriptor = Arc::clone(entity.descriptor());
        let scalars = entity.scalar_snapshot();
        for field in descriptor.scalar_fields() {
            match scalars.get(field) {
                Some(value) => doc.insert(field.clone(), value.clone()),
                None => {
                    debug!(id = %id, field = %field, "scalar field unset, omitted from document");
                }
            }
        }

        for field in descriptor.reference_fields() {
            match entity.reference_slot(field) {
                Some(RefSlot::Resolved(target)) => {
                    let target_id = self.ensure_saved(&target)?;
                    doc.insert_reference(field.clone(), &target_id);
                }
                Some(RefSlot::Raw(ref_id)) => doc.insert_reference(field.clone(), &ref_id),
                None => {
                    debug!(id = %id, field = %field, "reference field unset, omitted from document");
                }
            }
        }

        for field in descriptor.reference_list_fields() {
            let Some(slots) = entity.reference_list_slots(field) else {
                debug!(id = %id, field = %field, "reference list unset, omitted from document");
                continue;
            };
            let mut ids = Vec::with_capacity(slots.len());
            for slot in slots {
                ids.push(match slot {
                    RefSlot::Resolved(target) => self.ensure_saved(&target)?,
                    RefSlot::Raw(ref_id) => ref_id,
                });
            }
            doc.insert_reference_list(field.clone(), &ids);
        }

        Ok(doc)
    }

    /// The id of a referenced entity, saving it first if it never was.
    fn ensure_saved(&self, target: &EntityHandle) -> MapperResult<DocId> {
        match target.id() {
            Some(id) => Ok(id),
            None => self.save(target),
        }
    }

    // -- per-id load gates --------------------------------------------------

    fn load_gate(&self, id: &DocId) -> Arc<Mutex<()>> {
        let mut gates = self.in_flight.lock().expect("lock poisoned");
        Arc::clone(
            gates
                .entry(id.clone())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }

    fn drop_load_gate(&self, id: &DocId, gate: Arc<Mutex<()>>) {
        drop(gate);
        let mut gates = self.in_flight.lock().expect("lock poisoned");
        // Only the map still holds the gate: no loader is waiting on it.
        if gates.get(id).is_some_and(|g| Arc::strong_count(g) == 1) {
            gates.remove(id);
        }
    }
}

impl std::fmt::Debug for Mapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mapper")
            .field("cache", &self.cache)
            .field("registry", &self.registry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::TypeDescriptor;
    use arena_store::{InMemoryDocStore, StoreError, StoreResult};
    use arena_types::TypeTag;
    use serde_json::Value;

    fn tag(s: &str) -> TypeTag {
        TypeTag::new(s).unwrap()
    }

    /// Registry with the reference shapes the tests need: tasks point at
    /// their contest, contests list their tasks.
    fn test_registry() -> Arc<TypeRegistry> {
        let registry = TypeRegistry::new();
        registry.register(
            TypeDescriptor::builder(tag("task"))
                .scalar("name")
                .scalar("title")
                .reference("contest")
                .build()
                .unwrap(),
        );
        registry.register(
            TypeDescriptor::builder(tag("contest"))
                .scalar("name")
                .reference_list("tasks")
                .build()
                .unwrap(),
        );
        Arc::new(registry)
    }

    fn test_mapper() -> (Arc<InMemoryDocStore>, Arc<TypeRegistry>, Mapper) {
        let store = Arc::new(InMemoryDocStore::new());
        let registry = test_registry();
        let mapper = Mapper::new(
            Arc::clone(&store) as Arc<dyn DocStore>,
            Arc::clone(&registry),
        );
        (store, registry, mapper)
    }

    /// A second mapper over the same store with a fresh cache, to force
    /// reconstruction from documents.
    fn fresh_cache_mapper(store: &Arc<InMemoryDocStore>, registry: &Arc<TypeRegistry>) -> Mapper {
        Mapper::new(
            Arc::clone(store) as Arc<dyn DocStore>,
            Arc::clone(registry),
        )
    }

    fn new_task(registry: &TypeRegistry, name: &str) -> EntityHandle {
        let task = registry.instantiate(&tag("task")).unwrap();
        task.set_scalar("name", Value::String(name.into())).unwrap();
        task
    }

    // -----------------------------------------------------------------------
    // Save
    // -----------------------------------------------------------------------

    #[test]
    fn save_fresh_entity_allocates_first_free_id() {
        let (store, registry, mapper) = test_mapper();

        let task = new_task(&registry, "A+B");
        let id = mapper.save(&task).unwrap();

        assert_eq!(id, DocId::indexed("task", 0));
        assert_eq!(task.id(), Some(id.clone()));
        let doc = store.get(&id).unwrap().unwrap();
        assert_eq!(
            serde_json::to_value(&doc).unwrap(),
            serde_json::json!({"document_type": "task", "name": "A+B"})
        );
    }

    #[test]
    fn saved_entity_is_registered_in_cache() {
        let (_store, registry, mapper) = test_mapper();

        let task = new_task(&registry, "A+B");
        let id = mapper.save(&task).unwrap();

        let loaded = mapper.load(&id).unwrap();
        assert!(Entity::same_instance(&loaded, &task));
    }

    #[test]
    fn sequential_saves_allocate_distinct_ids() {
        let (_store, registry, mapper) = test_mapper();

        let id1 = mapper.save(&new_task(&registry, "first")).unwrap();
        let id2 = mapper.save(&new_task(&registry, "second")).unwrap();

        assert_eq!(id1, DocId::indexed("task", 0));
        assert_eq!(id2, DocId::indexed("task", 1));
    }

    #[test]
    fn save_omits_unset_scalars() {
        let (store, registry, mapper) = test_mapper();

        let task = new_task(&registry, "A+B");
        // "title" never set.
        let id = mapper.save(&task).unwrap();

        let doc = store.get(&id).unwrap().unwrap();
        assert!(doc.get("title").is_none());
    }

    #[test]
    fn resave_overwrites_document() {
        let (store, registry, mapper) = test_mapper();

        let task = new_task(&registry, "before");
        let id = mapper.save(&task).unwrap();
        task.set_scalar("name", Value::String("after".into())).unwrap();
        mapper.save(&task).unwrap();

        let doc = store.get(&id).unwrap().unwrap();
        assert_eq!(doc.get("name"), Some(&Value::String("after".into())));
    }

    #[test]
    fn resave_preserves_unknown_store_keys() {
        let (store, registry, mapper) = test_mapper();

        let task = new_task(&registry, "A+B");
        let id = mapper.save(&task).unwrap();

        // Another service annotates the document behind the mapper's back.
        let mut doc = store.get(&id).unwrap().unwrap();
        doc.insert("annotation", Value::String("seen by grader".into()));
        store.put(&id, &doc).unwrap();

        mapper.save(&task).unwrap();
        let doc = store.get(&id).unwrap().unwrap();
        assert_eq!(
            doc.get("annotation"),
            Some(&Value::String("seen by grader".into()))
        );
    }

    #[test]
    fn save_flattens_references_to_ids() {
        let (store, registry, mapper) = test_mapper();

        let contest = registry.instantiate(&tag("contest")).unwrap();
        contest.set_scalar("name", Value::String("ioi".into())).unwrap();
        let contest_id = mapper.save(&contest).unwrap();

        let task = new_task(&registry, "A+B");
        task.set_reference("contest", &contest).unwrap();
        let task_id = mapper.save(&task).unwrap();

        let doc = store.get(&task_id).unwrap().unwrap();
        assert_eq!(doc.get_reference("contest"), Some(contest_id));
    }

    #[test]
    fn save_cascades_to_unsaved_references() {
        let (store, registry, mapper) = test_mapper();

        let contest = registry.instantiate(&tag("contest")).unwrap();
        let t1 = new_task(&registry, "one");
        let t2 = new_task(&registry, "two");
        contest
            .set_reference_list("tasks", &[Arc::clone(&t1), Arc::clone(&t2)])
            .unwrap();

        let contest_id = mapper.save(&contest).unwrap();

        // Both tasks were persisted on the way.
        assert!(t1.id().is_some());
        assert!(t2.id().is_some());
        let doc = store.get(&contest_id).unwrap().unwrap();
        assert_eq!(
            doc.get_reference_list("tasks"),
            Some(vec![t1.id().unwrap(), t2.id().unwrap()])
        );
    }

    #[test]
    fn cyclic_fresh_entities_save_once() {
        let (store, registry, mapper) = test_mapper();

        let contest = registry.instantiate(&tag("contest")).unwrap();
        let task = new_task(&registry, "A+B");
        task.set_reference("contest", &contest).unwrap();
        contest
            .set_reference_list("tasks", &[Arc::clone(&task)])
            .unwrap();

        let contest_id = mapper.save(&contest).unwrap();
        let task_id = task.id().expect("task saved in cascade");

        let contest_doc = store.get(&contest_id).unwrap().unwrap();
        assert_eq!(
            contest_doc.get_reference_list("tasks"),
            Some(vec![task_id.clone()])
        );
        let task_doc = store.get(&task_id).unwrap().unwrap();
        assert_eq!(task_doc.get_reference("contest"), Some(contest_id));
    }

    #[test]
    fn save_reference_list_preserves_order_and_duplicates() {
        let (store, registry, mapper) = test_mapper();

        let contest = registry.instantiate(&tag("contest")).unwrap();
        let t1 = new_task(&registry, "one");
        let t2 = new_task(&registry, "two");
        mapper.save(&t1).unwrap();
        mapper.save(&t2).unwrap();
        contest
            .set_reference_list("tasks", &[Arc::clone(&t2), Arc::clone(&t1), Arc::clone(&t2)])
            .unwrap();

        let contest_id = mapper.save(&contest).unwrap();
        let doc = store.get(&contest_id).unwrap().unwrap();
        assert_eq!(
            doc.get_reference_list("tasks"),
            Some(vec![
                t2.id().unwrap(),
                t1.id().unwrap(),
                t2.id().unwrap(),
            ])
        );
    }

    // -----------------------------------------------------------------------
    // Load
    // -----------------------------------------------------------------------

    #[test]
    fn load_missing_id_is_not_found() {
        let (_store, _registry, mapper) = test_mapper();
        let err = mapper.load(&DocId::from_raw("task-99")).unwrap_err();
        assert!(matches!(err, MapperError::NotFound(_)));
    }

    #[test]
    fn load_twice_returns_same_instance() {
        let (store, registry, mapper) = test_mapper();
        let id = mapper.save(&new_task(&registry, "A+B")).unwrap();

        let second = fresh_cache_mapper(&store, &registry);
        let first_load = second.load(&id).unwrap();
        let second_load = second.load(&id).unwrap();
        assert!(Entity::same_instance(&first_load, &second_load));
    }

    #[test]
    fn scalar_round_trip_through_store() {
        let (store, registry, mapper) = test_mapper();
        let task = new_task(&registry, "A+B");
        task.set_scalar("title", Value::String("Sum of two".into())).unwrap();
        let id = mapper.save(&task).unwrap();

        let loaded = fresh_cache_mapper(&store, &registry).load(&id).unwrap();
        assert!(!Entity::same_instance(&loaded, &task));
        assert_eq!(
            loaded.scalar("name").unwrap(),
            Some(Value::String("A+B".into()))
        );
        assert_eq!(
            loaded.scalar("title").unwrap(),
            Some(Value::String("Sum of two".into()))
        );
    }

    #[test]
    fn load_resolves_single_reference() {
        let (store, registry, mapper) = test_mapper();

        let contest = registry.instantiate(&tag("contest")).unwrap();
        let task = new_task(&registry, "A+B");
        task.set_reference("contest", &contest).unwrap();
        let task_id = mapper.save(&task).unwrap();
        let contest_id = contest.id().unwrap();

        let second = fresh_cache_mapper(&store, &registry);
        let loaded_task = second.load(&task_id).unwrap();
        let loaded_contest = second.load(&contest_id).unwrap();

        let via_ref = loaded_task.reference("contest").unwrap().unwrap();
        assert!(Entity::same_instance(&via_ref, &loaded_contest));
    }

    #[test]
    fn load_resolves_reference_list_in_order() {
        let (store, registry, mapper) = test_mapper();

        let contest = registry.instantiate(&tag("contest")).unwrap();
        let t1 = new_task(&registry, "one");
        let t2 = new_task(&registry, "two");
        contest
            .set_reference_list("tasks", &[Arc::clone(&t1), Arc::clone(&t2)])
            .unwrap();
        let contest_id = mapper.save(&contest).unwrap();

        let second = fresh_cache_mapper(&store, &registry);
        let loaded = second.load(&contest_id).unwrap();
        let tasks = loaded.reference_list("tasks").unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(
            tasks[0].scalar("name").unwrap(),
            Some(Value::String("one".into()))
        );
        assert_eq!(
            tasks[1].scalar("name").unwrap(),
            Some(Value::String("two".into()))
        );
    }

    #[test]
    fn load_unknown_type_fails_and_caches_nothing() {
        let (store, _registry, mapper) = test_mapper();

        let id = DocId::from_raw("mystery-0");
        let doc = Document::new(&tag("mystery"));
        store.put(&id, &doc).unwrap();

        let err = mapper.load(&id).unwrap_err();
        assert!(matches!(err, MapperError::UnknownType(t) if t == tag("mystery")));
        assert!(mapper.cache().is_empty());
    }

    #[test]
    fn load_untagged_document_fails() {
        let (store, _registry, mapper) = test_mapper();

        let id = DocId::from_raw("task-0");
        let mut doc = Document::from_fields(Default::default());
        doc.insert("name", Value::String("A+B".into()));
        store.put(&id, &doc).unwrap();

        let err = mapper.load(&id).unwrap_err();
        assert!(matches!(err, MapperError::UntaggedDocument(_)));
        assert!(mapper.cache().is_empty());
    }

    #[test]
    fn evict_then_load_returns_new_instance() {
        let (_store, registry, mapper) = test_mapper();
        let task = new_task(&registry, "A+B");
        let id = mapper.save(&task).unwrap();

        assert!(mapper.evict(&id));
        let reloaded = mapper.load(&id).unwrap();
        assert!(!Entity::same_instance(&reloaded, &task));
    }

    // -----------------------------------------------------------------------
    // Cycle safety
    // -----------------------------------------------------------------------

    /// Store wrapper counting document fetches per id.
    struct CountingStore {
        inner: Arc<InMemoryDocStore>,
        gets: Mutex<HashMap<DocId, usize>>,
    }

    impl CountingStore {
        fn new(inner: Arc<InMemoryDocStore>) -> Self {
            Self {
                inner,
                gets: Mutex::new(HashMap::new()),
            }
        }

        fn get_count(&self, id: &DocId) -> usize {
            *self.gets.lock().unwrap().get(id).unwrap_or(&0)
        }
    }

    impl DocStore for CountingStore {
        fn exists(&self, id: &DocId) -> StoreResult<bool> {
            self.inner.exists(id)
        }

        fn get(&self, id: &DocId) -> StoreResult<Option<Document>> {
            *self.gets.lock().unwrap().entry(id.clone()).or_insert(0) += 1;
            self.inner.get(id)
        }

        fn put(&self, id: &DocId, doc: &Document) -> StoreResult<()> {
            self.inner.put(id, doc)
        }

        fn create(&self, doc: &Document) -> StoreResult<DocId> {
            self.inner.create(doc)
        }
    }

    #[test]
    fn cyclic_references_load_with_one_fetch_per_document() {
        let (store, registry, mapper) = test_mapper();

        let contest = registry.instantiate(&tag("contest")).unwrap();
        let task = new_task(&registry, "A+B");
        task.set_reference("contest", &contest).unwrap();
        contest
            .set_reference_list("tasks", &[Arc::clone(&task)])
            .unwrap();
        let contest_id = mapper.save(&contest).unwrap();
        let task_id = task.id().unwrap();

        let counting = Arc::new(CountingStore::new(Arc::clone(&store)));
        let second = Mapper::new(
            Arc::clone(&counting) as Arc<dyn DocStore>,
            Arc::clone(&registry),
        );

        let loaded_contest = second.load(&contest_id).unwrap();
        let loaded_task = second.load(&task_id).unwrap();

        // Cross-references are identity-consistent.
        let back = loaded_task.reference("contest").unwrap().unwrap();
        assert!(Entity::same_instance(&back, &loaded_contest));
        let tasks = loaded_contest.reference_list("tasks").unwrap();
        assert!(Entity::same_instance(&tasks[0], &loaded_task));

        // Each document was fetched exactly once despite the cycle.
        assert_eq!(counting.get_count(&contest_id), 1);
        assert_eq!(counting.get_count(&task_id), 1);
    }

    // -----------------------------------------------------------------------
    // Refresh
    // -----------------------------------------------------------------------

    #[test]
    fn refresh_overwrites_in_place() {
        let (store, registry, mapper) = test_mapper();
        let task = new_task(&registry, "stale");
        let id = mapper.save(&task).unwrap();
        let other_holder = Arc::clone(&task);

        // Mutate the store copy behind the cache's back.
        let mut doc = store.get(&id).unwrap().unwrap();
        doc.insert("name", Value::String("current".into()));
        store.put(&id, &doc).unwrap();

        mapper.refresh(&task).unwrap();

        assert_eq!(
            task.scalar("name").unwrap(),
            Some(Value::String("current".into()))
        );
        // No duplicate object: the other holder observes the update too.
        assert_eq!(
            other_holder.scalar("name").unwrap(),
            Some(Value::String("current".into()))
        );
        assert!(Entity::same_instance(&mapper.load(&id).unwrap(), &task));
    }

    #[test]
    fn refresh_of_vanished_document_is_not_found() {
        let (store, registry, mapper) = test_mapper();
        let task = new_task(&registry, "A+B");
        let id = mapper.save(&task).unwrap();

        store.remove(&id);
        let err = mapper.refresh(&task).unwrap_err();
        assert!(matches!(err, MapperError::NotFound(gone) if gone == id));
        // The instance is untouched.
        assert_eq!(
            task.scalar("name").unwrap(),
            Some(Value::String("A+B".into()))
        );
    }

    #[test]
    fn refresh_of_unsaved_entity_fails() {
        let (_store, registry, mapper) = test_mapper();
        let task = new_task(&registry, "A+B");
        let err = mapper.refresh(&task).unwrap_err();
        assert!(matches!(err, MapperError::UnsavedEntity(t) if t == tag("task")));
    }

    #[test]
    fn refresh_rejects_retagged_document() {
        let (store, registry, mapper) = test_mapper();
        let task = new_task(&registry, "A+B");
        let id = mapper.save(&task).unwrap();

        let mut doc = store.get(&id).unwrap().unwrap();
        doc.set_type_tag(&tag("contest"));
        store.put(&id, &doc).unwrap();

        let err = mapper.refresh(&task).unwrap_err();
        assert!(matches!(err, MapperError::TypeMismatch { .. }));
    }

    #[test]
    fn load_fresh_refreshes_cached_instance() {
        let (store, registry, mapper) = test_mapper();
        let task = new_task(&registry, "stale");
        let id = mapper.save(&task).unwrap();

        let mut doc = store.get(&id).unwrap().unwrap();
        doc.insert("name", Value::String("current".into()));
        store.put(&id, &doc).unwrap();

        // Plain load keeps serving the cached fields...
        let cached = mapper.load(&id).unwrap();
        assert_eq!(
            cached.scalar("name").unwrap(),
            Some(Value::String("stale".into()))
        );

        // ...load_fresh re-reads the store but keeps the instance.
        let refreshed = mapper.load_fresh(&id).unwrap();
        assert!(Entity::same_instance(&refreshed, &task));
        assert_eq!(
            refreshed.scalar("name").unwrap(),
            Some(Value::String("current".into()))
        );
    }

    #[test]
    fn refresh_re_resolves_references_through_cache() {
        let (store, registry, mapper) = test_mapper();

        let contest = registry.instantiate(&tag("contest")).unwrap();
        let task = new_task(&registry, "A+B");
        task.set_reference("contest", &contest).unwrap();
        let task_id = mapper.save(&task).unwrap();

        // Touch the store copy so refresh has something to apply.
        let doc = store.get(&task_id).unwrap().unwrap();
        store.put(&task_id, &doc).unwrap();

        mapper.refresh(&task).unwrap();
        let via_ref = task.reference("contest").unwrap().unwrap();
        assert!(Entity::same_instance(&via_ref, &contest));
    }

    // -----------------------------------------------------------------------
    // Concurrency
    // -----------------------------------------------------------------------

    #[test]
    fn concurrent_loads_construct_once() {
        use std::thread;

        let (store, registry, mapper) = test_mapper();
        let id = mapper.save(&new_task(&registry, "shared")).unwrap();

        let counting = Arc::new(CountingStore::new(Arc::clone(&store)));
        let second = Arc::new(Mapper::new(
            Arc::clone(&counting) as Arc<dyn DocStore>,
            Arc::clone(&registry),
        ));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let mapper = Arc::clone(&second);
                let id = id.clone();
                thread::spawn(move || mapper.load(&id).unwrap())
            })
            .collect();

        let loaded: Vec<EntityHandle> = handles
            .into_iter()
            .map(|h| h.join().expect("thread should not panic"))
            .collect();

        // Every thread observed the same instance, and the document was
        // fetched by exactly one of them.
        for entity in &loaded[1..] {
            assert!(Entity::same_instance(entity, &loaded[0]));
        }
        assert_eq!(counting.get_count(&id), 1);
    }

    // -----------------------------------------------------------------------
    // Store failure propagation
    // -----------------------------------------------------------------------

    /// Store whose every operation fails, for error-propagation tests.
    struct UnreachableStore;

    impl DocStore for UnreachableStore {
        fn exists(&self, _id: &DocId) -> StoreResult<bool> {
            Err(StoreError::Unavailable("connection refused".into()))
        }

        fn get(&self, _id: &DocId) -> StoreResult<Option<Document>> {
            Err(StoreError::Unavailable("connection refused".into()))
        }

        fn put(&self, _id: &DocId, _doc: &Document) -> StoreResult<()> {
            Err(StoreError::Unavailable("connection refused".into()))
        }

        fn create(&self, _doc: &Document) -> StoreResult<DocId> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
    }

    #[test]
    fn store_failure_aborts_save() {
        let registry = test_registry();
        let mapper = Mapper::new(Arc::new(UnreachableStore), Arc::clone(&registry));

        let task = new_task(&registry, "A+B");
        let err = mapper.save(&task).unwrap_err();
        assert!(matches!(err, MapperError::Store(_)));
        // Allocation aborted before any id was bound.
        assert_eq!(task.id(), None);
    }

    #[test]
    fn store_failure_aborts_load() {
        let registry = test_registry();
        let mapper = Mapper::new(Arc::new(UnreachableStore), Arc::clone(&registry));

        let err = mapper.load(&DocId::from_raw("task-0")).unwrap_err();
        assert!(matches!(err, MapperError::Store(_)));
    }
}
