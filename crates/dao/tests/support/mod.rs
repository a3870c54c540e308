//! Shared fixtures for the integration tests: in-memory datasources and small schemas

#![allow(dead_code)]

use std::sync::{Arc, OnceLock};

use elif_dao::{
    Association, Dao, DaoError, DaoHooks, DaoOptions, Datasource, JoinTableLister, OrmDescriptor, Property,
    PropertyType,
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub async fn datasource() -> Datasource {
    init_tracing();
    Datasource::in_memory().await.expect("in-memory datasource")
}

/// `T(id INTEGER, name VARCHAR unique)`
pub async fn names_dao(datasource: &Datasource) -> Arc<Dao> {
    let orm = OrmDescriptor::builder("T")
        .property(Property::new("id", "ID", PropertyType::Integer).primary_key())
        .property(Property::new("name", "NAME", PropertyType::Varchar).size(20).unique())
        .build()
        .expect("T descriptor");
    let dao = Dao::create(orm, datasource, DaoOptions::new()).expect("T dao");
    dao.create_table().await.expect("T table");
    dao
}

/// `PRODUCTS(id, name VARCHAR required, quantity INTEGER, price DOUBLE, active BOOLEAN required)`
pub async fn products_dao(datasource: &Datasource) -> Arc<Dao> {
    let orm = OrmDescriptor::builder("PRODUCTS")
        .property(Property::new("id", "PRODUCT_ID", PropertyType::Integer).primary_key())
        .property(Property::new("name", "PRODUCT_NAME", PropertyType::Varchar).size(100).required())
        .property(Property::new("quantity", "PRODUCT_QUANTITY", PropertyType::Integer))
        .property(Property::new("price", "PRODUCT_PRICE", PropertyType::Double))
        .property(Property::new("active", "PRODUCT_ACTIVE", PropertyType::Boolean).required())
        .build()
        .expect("PRODUCTS descriptor");
    let dao = Dao::create(orm, datasource, DaoOptions::new()).expect("PRODUCTS dao");
    dao.create_table().await.expect("PRODUCTS table");
    dao
}

/// Parents with one-to-many `children`; children point back with many-to-one `parent`
pub struct Family {
    pub parents: Arc<Dao>,
    pub children: Arc<Dao>,
}

pub async fn family(datasource: &Datasource) -> Family {
    family_with_hooks(datasource, DaoHooks::new()).await
}

pub async fn family_with_hooks(datasource: &Datasource, parent_hooks: DaoHooks) -> Family {
    let parent_slot: Arc<OnceLock<Arc<Dao>>> = Arc::new(OnceLock::new());
    let slot = parent_slot.clone();

    let children_orm = OrmDescriptor::builder("CHILDREN")
        .property(Property::new("id", "CHILD_ID", PropertyType::Integer).primary_key())
        .property(Property::new("parentId", "CHILD_PARENT", PropertyType::Integer).required())
        .property(Property::new("name", "CHILD_NAME", PropertyType::Varchar).size(50).required())
        .property(Property::new("age", "CHILD_AGE", PropertyType::Integer))
        .association(Association::many_to_one("parent", "parentId").target(move || {
            slot.get()
                .cloned()
                .ok_or_else(|| DaoError::MissingCollaborator("parents DAO not ready".to_string()))
        }))
        .build()
        .expect("CHILDREN descriptor");
    let children = Dao::create(children_orm, datasource, DaoOptions::new()).expect("CHILDREN dao");

    let target = children.clone();
    let parents_orm = OrmDescriptor::builder("PARENTS")
        .property(Property::new("id", "PARENT_ID", PropertyType::Integer).primary_key())
        .property(Property::new("name", "PARENT_NAME", PropertyType::Varchar).size(50).required())
        .association(Association::one_to_many("children", "parentId").target(move || Ok(target.clone())))
        .build()
        .expect("PARENTS descriptor");
    let parents = Dao::create(parents_orm, datasource, DaoOptions::new().hooks(parent_hooks)).expect("PARENTS dao");
    let _ = parent_slot.set(parents.clone());

    parents.create_table().await.expect("PARENTS table");
    children.create_table().await.expect("CHILDREN table");
    Family { parents, children }
}

/// Students enrolled in courses through `ENROLLMENTS`
pub struct School {
    pub students: Arc<Dao>,
    pub courses: Arc<Dao>,
    pub enrollments: Arc<Dao>,
}

pub async fn school(datasource: &Datasource) -> School {
    let courses_orm = OrmDescriptor::builder("COURSES")
        .property(Property::new("id", "COURSE_ID", PropertyType::Integer).primary_key())
        .property(Property::new("title", "COURSE_TITLE", PropertyType::Varchar).size(50).required())
        .build()
        .expect("COURSES descriptor");
    let courses = Dao::create(courses_orm, datasource, DaoOptions::new()).expect("COURSES dao");

    let enrollments_orm = OrmDescriptor::builder("ENROLLMENTS")
        .property(Property::new("id", "ENROLLMENT_ID", PropertyType::Integer).primary_key())
        .property(Property::new("studentId", "ENROLLMENT_STUDENT", PropertyType::Integer).required())
        .property(Property::new("courseId", "ENROLLMENT_COURSE", PropertyType::Integer).required())
        .build()
        .expect("ENROLLMENTS descriptor");
    let enrollments = Dao::create(
        enrollments_orm,
        datasource,
        DaoOptions::new().join_lister(JoinTableLister::new("courseId")),
    )
    .expect("ENROLLMENTS dao");

    let target = courses.clone();
    let join = enrollments.clone();
    let students_orm = OrmDescriptor::builder("STUDENTS")
        .property(Property::new("id", "STUDENT_ID", PropertyType::Integer).primary_key())
        .property(Property::new("name", "STUDENT_NAME", PropertyType::Varchar).size(50).required())
        .association(
            Association::many_to_many("courses", "studentId")
                .target(move || Ok(target.clone()))
                .join(move || Ok(join.clone())),
        )
        .build()
        .expect("STUDENTS descriptor");
    let students = Dao::create(students_orm, datasource, DaoOptions::new()).expect("STUDENTS dao");

    for dao in [&students, &courses, &enrollments] {
        dao.create_table().await.expect("school table");
    }
    School {
        students,
        courses,
        enrollments,
    }
}

/// People owning a one-to-one `passport` (by primary key) and `badge` (by badge `code`)
pub struct Registry {
    pub people: Arc<Dao>,
    pub passports: Arc<Dao>,
    pub badges: Arc<Dao>,
}

pub async fn registry(datasource: &Datasource) -> Registry {
    registry_with_hooks(datasource, DaoHooks::new()).await
}

pub async fn registry_with_hooks(datasource: &Datasource, people_hooks: DaoHooks) -> Registry {
    let passports_orm = OrmDescriptor::builder("PASSPORTS")
        .property(Property::new("id", "PASSPORT_ID", PropertyType::Integer).primary_key())
        .property(Property::new("number", "PASSPORT_NUMBER", PropertyType::Varchar).size(20).required())
        .build()
        .expect("PASSPORTS descriptor");
    let passports = Dao::create(passports_orm, datasource, DaoOptions::new()).expect("PASSPORTS dao");

    let badges_orm = OrmDescriptor::builder("BADGES")
        .property(Property::new("id", "BADGE_ID", PropertyType::Integer).primary_key())
        .property(Property::new("code", "BADGE_CODE", PropertyType::Varchar).size(20).required().unique())
        .property(Property::new("color", "BADGE_COLOR", PropertyType::Varchar).size(20))
        .build()
        .expect("BADGES descriptor");
    let badges = Dao::create(badges_orm, datasource, DaoOptions::new()).expect("BADGES dao");

    let (passport_target, badge_target) = (passports.clone(), badges.clone());
    let people_orm = OrmDescriptor::builder("PEOPLE")
        .property(Property::new("id", "PERSON_ID", PropertyType::Integer).primary_key())
        .property(Property::new("name", "PERSON_NAME", PropertyType::Varchar).size(50).required())
        .property(Property::new("passportId", "PERSON_PASSPORT", PropertyType::Integer))
        .property(Property::new("badgeCode", "PERSON_BADGE", PropertyType::Varchar).size(20))
        .association(Association::one_to_one("passport", "passportId").target(move || Ok(passport_target.clone())))
        .association(
            Association::one_to_one("badge", "badgeCode")
                .key("code")
                .target(move || Ok(badge_target.clone())),
        )
        .build()
        .expect("PEOPLE descriptor");
    let people = Dao::create(people_orm, datasource, DaoOptions::new().hooks(people_hooks)).expect("PEOPLE dao");

    for dao in [&people, &passports, &badges] {
        dao.create_table().await.expect("registry table");
    }
    Registry {
        people,
        passports,
        badges,
    }
}
