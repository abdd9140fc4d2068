mod common;

use binder::{Condition, Error, Model, QueryCol, Value};

use common::TestDb;

#[derive(Debug, Clone, PartialEq, Model)]
struct Person {
    #[column(auto_id)]
    id: Option<i64>,
    #[column(unique, max_length = 16)]
    name: String,
    #[column(column_name = "nick_name")]
    nick: Option<String>,
    age: i32,
    height: f64,
    admin: bool,
}

#[derive(Debug, PartialEq, Model)]
#[table(table_name = "tags")]
struct Tag {
    label: String,
}

fn person(name: &str, age: i32) -> Person {
    Person {
        id: None,
        name: name.to_string(),
        nick: None,
        age,
        height: 1.75,
        admin: false,
    }
}

#[test]
fn derived_table() {
    let table = Person::table();
    assert_eq!(table.name(), "person");

    let names = table
        .columns()
        .iter()
        .map(|c| c.name())
        .collect::<Vec<_>>();
    assert_eq!(names, ["id", "name", "nick_name", "age", "height", "admin"]);

    assert_eq!(table.auto_id_col().unwrap().name(), "id");
    let name = table.column("name").unwrap();
    assert!(name.is_unique() && name.is_not_null());
    assert_eq!(name.get_max_length(), Some(16));
    assert!(!table.column("nick_name").unwrap().is_not_null());

    assert_eq!(Tag::table().name(), "tags");
    assert!(Tag::table().auto_id_col().is_none());
}

#[test]
fn record_conversion() {
    let mut p = person("ada", 36);
    p.nick = Some("countess".into());

    let record = p.to_record();
    assert_eq!(record.get("nick_name"), Some(&Value::from("countess")));
    assert_eq!(record.get("id"), Some(&Value::Null));
    assert_eq!(Person::from_record(&record).unwrap(), p);

    let mut bad = record.clone();
    bad.set("age", "old").unwrap();
    let err = Person::from_record(&bad).unwrap_err();
    assert!(matches!(err, Error::Type(_)));
    assert_eq!(err.to_string(), "column 'age': int expected, got str");
}

#[tokio::test]
async fn insert_get_select() {
    let db = TestDb::new();
    let conn = db.connect().await;
    conn.create_table(Person::table()).await.unwrap();

    let mut ada = person("ada", 36);
    let mut alan = person("alan", 41);
    alan.admin = true;

    conn.insert_model(&mut ada).await.unwrap();
    conn.insert_model(&mut alan).await.unwrap();
    conn.commit().await.unwrap();

    assert_eq!(ada.id, Some(1));
    assert_eq!(alan.id, Some(2));

    let fetched = conn.get_model::<Person>(2).await.unwrap();
    assert_eq!(fetched, Some(alan.clone()));
    assert_eq!(conn.get_model::<Person>(3).await.unwrap(), None);

    let admins = conn
        .select_models::<Person>(QueryCol::new("admin").eq(true), &[])
        .await
        .unwrap();
    assert_eq!(admins, vec![alan.clone()]);

    let everyone = conn
        .select_models::<Person>(Condition::all(), &[QueryCol::new("age").desc()])
        .await
        .unwrap();
    assert_eq!(everyone, vec![alan, ada]);
}

#[tokio::test]
async fn tables_without_auto_id() {
    let db = TestDb::new();
    let conn = db.connect().await;
    conn.create_table(Tag::table()).await.unwrap();

    let mut tag = Tag {
        label: "rust".into(),
    };
    conn.insert_model(&mut tag).await.unwrap();

    let err = conn.get_model::<Tag>(1).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "get(): table 'tags' does not have AutoIdCol"
    );

    let tags = conn
        .select_models::<Tag>(Condition::all(), &[])
        .await
        .unwrap();
    assert_eq!(tags, vec![tag]);
}
