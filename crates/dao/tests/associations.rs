mod support;

use std::sync::{Arc, Mutex};

use elif_dao::{DaoError, DaoHooks, Entity, ExpandContext, FindOptions, QuerySettings};
use serde_json::{json, Value};

fn child(name: &str, age: i64) -> Value {
    json!({"name": name, "age": age})
}

#[tokio::test]
async fn test_insert_cascades_inline_children() {
    let datasource = support::datasource().await;
    let family = support::family(&datasource).await;

    let parent = Entity::new()
        .with("name", "Ann")
        .with("children", json!([child("Bob", 7), child("Cid", 4)]));
    let id = family.parents.insert(parent).await.unwrap();

    let children = family
        .children
        .list(QuerySettings::new().condition("parentId", id.clone()))
        .await
        .unwrap();
    assert_eq!(children.len(), 2);
    assert!(children.iter().all(|c| c.get("parentId") == Some(&id)));
    assert!(children.iter().all(|c| c.get("id").and_then(Value::as_i64).is_some()));
}

#[tokio::test]
async fn test_expansion_returns_children_in_result_set_order() {
    let datasource = support::datasource().await;
    let family = support::family(&datasource).await;

    let ann = family
        .parents
        .insert(Entity::new().with("name", "Ann").with("children", json!([child("Bob", 7), child("Cid", 4)])))
        .await
        .unwrap();
    family
        .parents
        .insert(Entity::new().with("name", "Dan").with("children", json!([child("Eve", 2)])))
        .await
        .unwrap();

    let found = family
        .parents
        .find(ann.clone(), FindOptions::new().expand(["children"]))
        .await
        .unwrap()
        .unwrap();
    let names: Vec<_> = found
        .nested("children")
        .unwrap()
        .iter()
        .map(|c| c.get("name").cloned())
        .collect();
    assert_eq!(names, vec![Some(json!("Bob")), Some(json!("Cid"))]);

    let listed = family
        .parents
        .list(QuerySettings::from_value(&json!({"$expand": "children", "$sort": "name"})).unwrap())
        .await
        .unwrap();
    let counts: Vec<_> = listed.iter().map(|p| p.nested("children").unwrap().len()).collect();
    assert_eq!(counts, vec![2, 1]);
}

#[tokio::test]
async fn test_expansion_with_select_keeps_join_columns() {
    let datasource = support::datasource().await;
    let family = support::family(&datasource).await;
    let id = family
        .parents
        .insert(Entity::new().with("name", "Ann").with("children", json!([child("Bob", 7)])))
        .await
        .unwrap();

    let found = family
        .parents
        .find(id.clone(), FindOptions::new().select(["name"]).expand(["children"]))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.get("id"), Some(&id));
    assert_eq!(found.nested("children").unwrap().len(), 1);
}

#[tokio::test]
async fn test_many_to_one_and_nested_paths() {
    let datasource = support::datasource().await;
    let family = support::family(&datasource).await;
    let id = family
        .parents
        .insert(Entity::new().with("name", "Ann").with("children", json!([child("Bob", 7), child("Cid", 4)])))
        .await
        .unwrap();

    let bob = family
        .children
        .list(QuerySettings::new().condition("name", "Bob").expand(["parent.children"]))
        .await
        .unwrap()
        .remove(0);
    let parent = bob.get("parent").cloned().unwrap();
    assert_eq!(parent["id"], id);
    assert_eq!(parent["name"], json!("Ann"));
    assert_eq!(parent["children"].as_array().map(Vec::len), Some(2));

    let siblings = family
        .children
        .expand("parent.children", ExpandContext::Entity(bob))
        .await
        .unwrap();
    assert_eq!(siblings["children"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn test_expand_by_id_and_unknown_associations() {
    let datasource = support::datasource().await;
    let family = support::family(&datasource).await;
    let id = family
        .parents
        .insert(Entity::new().with("name", "Ann").with("children", json!([child("Bob", 7)])))
        .await
        .unwrap();

    let children = family
        .parents
        .expand("children", ExpandContext::Id(id.clone()))
        .await
        .unwrap();
    assert_eq!(children.as_array().map(Vec::len), Some(1));

    assert!(matches!(
        family.parents.expand("pets", ExpandContext::Id(id.clone())).await,
        Err(DaoError::UnknownAssociation { ref name, .. }) if name == "pets"
    ));
    assert!(matches!(
        family.parents.find(id.clone(), FindOptions::new().expand(["pets"])).await,
        Err(DaoError::UnknownAssociation { .. })
    ));
    assert!(matches!(
        family.parents.expand("children", ExpandContext::Id(json!(404))).await,
        Err(DaoError::InvalidArgument(_))
    ));
    assert!(matches!(
        family
            .parents
            .expand("children", ExpandContext::Entity(Entity::new().with("name", "Ann")))
            .await,
        Err(DaoError::InvalidArgument(_))
    ));
}

#[tokio::test]
async fn test_remove_deletes_dependents_first() {
    let datasource = support::datasource().await;
    let removed: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let log = removed.clone();
    let hooks = DaoHooks::new().before_remove_association_set(move |name, dependents, _id| {
        log.lock().unwrap().push(format!("{}:{}", name, dependents.len()));
        Ok(())
    });
    let family = support::family_with_hooks(&datasource, hooks).await;

    let id = family
        .parents
        .insert(
            Entity::new()
                .with("name", "Ann")
                .with("children", json!([child("Bob", 7), child("Cid", 4), child("Dot", 1)])),
        )
        .await
        .unwrap();
    let other = family
        .parents
        .insert(Entity::new().with("name", "Dan").with("children", json!([child("Eve", 2)])))
        .await
        .unwrap();

    family.parents.remove(id.clone()).await.unwrap();

    assert_eq!(*removed.lock().unwrap(), vec!["children:3".to_string()]);
    assert!(family
        .children
        .list(QuerySettings::new().condition("parentId", id.clone()))
        .await
        .unwrap()
        .is_empty());
    assert!(family.parents.find(id, FindOptions::new()).await.unwrap().is_none());
    assert_eq!(family.children.count().await.unwrap(), 1);
    assert!(family.parents.find(other, FindOptions::new()).await.unwrap().is_some());
}

#[tokio::test]
async fn test_failed_cascade_compensates_the_parent() {
    let datasource = support::datasource().await;
    let family = support::family(&datasource).await;

    let parent = Entity::new()
        .with("name", "Ann")
        .with("children", json!([child("Bob", 7), {"age": 3}]));
    let result = family.parents.insert(parent).await;

    assert!(matches!(
        result,
        Err(DaoError::ValidationFailed { ref table, ref property }) if table == "CHILDREN" && property == "name"
    ));
    assert_eq!(family.parents.count().await.unwrap(), 0);
    assert_eq!(family.children.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_many_to_many_through_join_table() {
    let datasource = support::datasource().await;
    let school = support::school(&datasource).await;

    let math = school.courses.insert(Entity::new().with("title", "Math")).await.unwrap();
    let art = school.courses.insert(Entity::new().with("title", "Art")).await.unwrap();
    school.courses.insert(Entity::new().with("title", "Music")).await.unwrap();

    let ann = school.students.insert(Entity::new().with("name", "Ann")).await.unwrap();
    let bob = school.students.insert(Entity::new().with("name", "Bob")).await.unwrap();
    for (student, course) in [(&ann, &math), (&ann, &art), (&bob, &art)] {
        school
            .enrollments
            .insert(Entity::new().with("studentId", student.clone()).with("courseId", course.clone()))
            .await
            .unwrap();
    }

    let found = school
        .students
        .find(ann.clone(), FindOptions::new().expand(["courses"]))
        .await
        .unwrap()
        .unwrap();
    let titles: Vec<_> = found
        .nested("courses")
        .unwrap()
        .iter()
        .map(|c| c.get("title").cloned())
        .collect();
    assert_eq!(titles, vec![Some(json!("Math")), Some(json!("Art"))]);

    school.students.remove(ann).await.unwrap();
    assert_eq!(school.enrollments.count().await.unwrap(), 3);
    assert_eq!(school.courses.count().await.unwrap(), 3);
}

#[tokio::test]
async fn test_hooks_run_at_their_points() {
    let datasource = support::datasource().await;
    let events: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

    let (inserted, before_set, after_set) = (events.clone(), events.clone(), events.clone());
    let (updating, removing) = (events.clone(), events.clone());
    let hooks = DaoHooks::new()
        .after_insert(move |entity| {
            inserted.lock().unwrap().push(format!("after_insert:{}", entity.get("name").unwrap()));
            Ok(())
        })
        .before_insert_association_set(move |name, set, _parent| {
            before_set.lock().unwrap().push(format!("before_set:{}:{}", name, set.len()));
            Ok(())
        })
        .after_insert_association_set(move |name, _set, _parent| {
            after_set.lock().unwrap().push(format!("after_set:{}", name));
            Ok(())
        })
        .before_update_entity(move |entity| {
            updating.lock().unwrap().push("before_update".to_string());
            entity.set("name", "Renamed");
            Ok(())
        })
        .before_remove_entity(move |id| {
            removing.lock().unwrap().push(format!("before_remove:{}", id));
            Ok(())
        })
        .after_found(|entity| {
            entity.set("seen", true);
            Ok(())
        });
    let family = support::family_with_hooks(&datasource, hooks).await;

    let id = family
        .parents
        .insert(Entity::new().with("name", "Ann").with("children", json!([child("Bob", 7)])))
        .await
        .unwrap();
    family
        .parents
        .update(&Entity::new().with("id", id.clone()).with("name", "Anna"))
        .await
        .unwrap();

    let found = family.parents.find(id.clone(), FindOptions::new()).await.unwrap().unwrap();
    assert_eq!(found.get("name"), Some(&json!("Renamed")));
    assert_eq!(found.get("seen"), Some(&json!(true)));

    family.parents.remove(id.clone()).await.unwrap();

    assert_eq!(
        *events.lock().unwrap(),
        vec![
            "after_insert:\"Ann\"".to_string(),
            "before_set:children:1".to_string(),
            "after_set:children".to_string(),
            "before_update".to_string(),
            format!("before_remove:{}", id),
        ]
    );
}

#[tokio::test]
async fn test_failing_hook_aborts_and_compensates() {
    let datasource = support::datasource().await;
    let hooks = DaoHooks::new().after_insert(|_| Err(DaoError::InvalidArgument("rejected".to_string())));
    let family = support::family_with_hooks(&datasource, hooks).await;

    let result = family.parents.insert(Entity::new().with("name", "Ann")).await;
    assert!(matches!(result, Err(DaoError::InvalidArgument(ref message)) if message == "rejected"));
    assert_eq!(family.parents.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_one_to_one_insert_expand_and_remove() {
    let datasource = support::datasource().await;
    let registry = support::registry(&datasource).await;

    let id = registry
        .people
        .insert(Entity::new().with("name", "Ann").with("passport", json!({"number": "P-1"})))
        .await
        .unwrap();
    let loner = registry.people.insert(Entity::new().with("name", "Lou")).await.unwrap();

    let ann = registry
        .people
        .find(id.clone(), FindOptions::new().expand(["passport"]))
        .await
        .unwrap()
        .unwrap();
    let passport_id = ann.get("passportId").cloned().unwrap();
    let passport = ann.get("passport").cloned().unwrap();
    assert_eq!(passport["id"], passport_id);
    assert_eq!(passport["number"], json!("P-1"));

    let lou = registry
        .people
        .find(loner.clone(), FindOptions::new().expand(["passport"]))
        .await
        .unwrap()
        .unwrap();
    assert!(!lou.is_set("passport"));

    registry.people.remove(id.clone()).await.unwrap();
    assert!(registry.people.find(id, FindOptions::new()).await.unwrap().is_none());
    assert_eq!(registry.passports.count().await.unwrap(), 0);

    registry.people.remove(loner).await.unwrap();
    assert_eq!(registry.people.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_one_to_one_on_a_non_primary_key() {
    let datasource = support::datasource().await;
    let registry = support::registry(&datasource).await;

    registry
        .badges
        .insert(Entity::new().with("code", "B-7").with("color", "red"))
        .await
        .unwrap();
    let bob = registry
        .people
        .insert(Entity::new().with("name", "Bob").with("badgeCode", "B-7"))
        .await
        .unwrap();
    let cy = registry
        .people
        .insert(Entity::new().with("name", "Cy").with("badge", json!([{"code": "B-9", "color": "blue"}])))
        .await
        .unwrap();

    let people = registry
        .people
        .list(QuerySettings::new().sort("name").expand(["badge"]))
        .await
        .unwrap();
    let colors: Vec<_> = people
        .iter()
        .map(|person| person.get("badge").and_then(|badge| badge.get("color")).cloned())
        .collect();
    assert_eq!(colors, vec![Some(json!("red")), Some(json!("blue"))]);
    assert_eq!(people[1].get("badgeCode"), Some(&json!("B-9")));

    registry.people.remove(bob).await.unwrap();
    let left = registry.badges.list(QuerySettings::new()).await.unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].get("code"), Some(&json!("B-9")));

    registry.people.remove(cy).await.unwrap();
    assert_eq!(registry.badges.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_failed_insert_removes_one_to_one_entities() {
    let datasource = support::datasource().await;
    let hooks = DaoHooks::new().after_insert(|_| Err(DaoError::ExecutionFailed("boom".to_string())));
    let rejecting = support::registry_with_hooks(&datasource, hooks).await;

    let result = rejecting
        .people
        .insert(Entity::new().with("name", "Ann").with("passport", json!({"number": "P-1"})))
        .await;
    assert!(matches!(result, Err(DaoError::ExecutionFailed(ref message)) if message == "boom"));
    assert_eq!(rejecting.people.count().await.unwrap(), 0);
    assert_eq!(rejecting.passports.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_failed_one_to_one_insert_leaves_nothing_behind() {
    let datasource = support::datasource().await;
    let registry = support::registry(&datasource).await;
    registry.badges.insert(Entity::new().with("code", "B-7")).await.unwrap();

    let invalid = registry
        .people
        .insert(Entity::new().with("name", "Ann").with("passport", json!({})))
        .await;
    assert!(matches!(
        invalid,
        Err(DaoError::ValidationFailed { ref table, ref property }) if table == "PASSPORTS" && property == "number"
    ));

    let duplicate = registry
        .people
        .insert(
            Entity::new()
                .with("name", "Ann")
                .with("passport", json!({"number": "P-2"}))
                .with("badge", json!({"code": "B-7"})),
        )
        .await;
    assert!(matches!(duplicate, Err(DaoError::UniqueConstraintViolation { .. })));

    assert_eq!(registry.people.count().await.unwrap(), 0);
    assert_eq!(registry.passports.count().await.unwrap(), 0);
    assert_eq!(registry.badges.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_per_entity_association_hooks() {
    let datasource = support::datasource().await;
    let events: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let (inserting, removing) = (events.clone(), events.clone());
    let hooks = DaoHooks::new()
        .before_insert_association_set_entity(move |name, child, parent| {
            let (child, parent) = (child.get("name").unwrap(), parent.get("name").unwrap());
            inserting.lock().unwrap().push(format!("insert:{}:{}:{}", name, child, parent));
            Ok(())
        })
        .before_remove_association_set_entity(move |name, dependent, _id| {
            let dependent = dependent.get("name").unwrap();
            removing.lock().unwrap().push(format!("remove:{}:{}", name, dependent));
            Ok(())
        });
    let family = support::family_with_hooks(&datasource, hooks).await;

    let id = family
        .parents
        .insert(Entity::new().with("name", "Ann").with("children", json!([child("Bob", 7), child("Cid", 4)])))
        .await
        .unwrap();
    family.parents.remove(id).await.unwrap();

    assert_eq!(
        *events.lock().unwrap(),
        vec![
            r#"insert:children:"Bob":"Ann""#.to_string(),
            r#"insert:children:"Cid":"Ann""#.to_string(),
            r#"remove:children:"Bob""#.to_string(),
            r#"remove:children:"Cid""#.to_string(),
        ]
    );
}
