use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use quill_orm::{Database, Entity, EntityMap, Error, Finder, Scope, Value, temporal, values};

#[derive(Entity, Debug, Default, Clone, PartialEq)]
#[orm(table = "t_user")]
pub struct User {
    #[orm(column, primary_key)]
    pub id: i64,
    #[orm(column)]
    pub name: String,
    #[orm(column)]
    pub nickname: Option<String>,
    #[orm(column)]
    pub score: f64,
}

#[derive(Entity, Debug, Default, Clone)]
#[orm(table = "t_tag")]
pub struct Tag {
    #[orm(column, primary_key)]
    pub id: String,
    #[orm(column)]
    pub label: String,
}

#[derive(Entity, Debug, Default, Clone)]
#[orm(table = "t_event")]
pub struct Event {
    #[orm(column, primary_key)]
    pub id: i64,
    #[orm(column)]
    pub happened_at: DateTime<Utc>,
    #[orm(column)]
    pub logged_at: NaiveDateTime,
}

async fn setup() -> Result<Database, Error> {
    let _ = env_logger::builder().is_test(true).try_init();
    let db = Database::builder().max_connections(1).connect("sqlite::memory:").await?;

    sqlx::query(
        "CREATE TABLE t_user (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL, nickname TEXT, score REAL NOT NULL)",
    )
    .execute(db.pool())
    .await?;
    sqlx::query("CREATE TABLE t_tag (id TEXT PRIMARY KEY, label TEXT NOT NULL)").execute(db.pool()).await?;
    sqlx::query(
        "CREATE TABLE t_event (id INTEGER PRIMARY KEY AUTOINCREMENT, happened_at TEXT NOT NULL, logged_at TEXT NOT NULL)",
    )
    .execute(db.pool())
    .await?;
    Ok(db)
}

async fn find_user(db: &Database, scope: &mut Scope, id: i64) -> Result<Option<User>, Error> {
    let mut finder = Finder::select("t_user");
    finder.append("WHERE id = ?", values![id]);
    db.query_one(scope, &mut finder).await
}

#[tokio::test]
async fn test_insert_reads_back_generated_key() -> Result<(), Box<dyn std::error::Error>> {
    let db = setup().await?;
    let mut scope = Scope::new();

    let mut alice = User { name: "alice".into(), score: 1.5, ..Default::default() };
    let mut bob = User { name: "bob".into(), nickname: Some("b".into()), ..Default::default() };

    db.transaction(&mut scope, async |scope: &mut Scope| {
        db.insert(scope, &mut alice).await?;
        db.insert(scope, &mut bob).await?;
        Ok(())
    })
    .await?;

    assert!(alice.id > 0);
    assert_eq!(bob.id, alice.id + 1);

    let fetched = find_user(&db, &mut scope, alice.id).await?;
    assert_eq!(fetched, Some(alice));

    let fetched = find_user(&db, &mut scope, bob.id).await?.unwrap();
    assert_eq!(fetched.nickname.as_deref(), Some("b"));
    Ok(())
}

#[tokio::test]
async fn test_insert_generates_string_key() -> Result<(), Box<dyn std::error::Error>> {
    let db = setup().await?;
    let mut scope = Scope::new();

    let mut tag = Tag { label: "rust".into(), ..Default::default() };
    let mut fixed = Tag { id: "fixed".into(), label: "kept".into() };

    db.transaction(&mut scope, async |scope: &mut Scope| {
        db.insert(scope, &mut tag).await?;
        db.insert(scope, &mut fixed).await?;
        Ok(())
    })
    .await?;

    assert_eq!(tag.id.len(), 32);
    assert_eq!(fixed.id, "fixed");

    let mut finder = Finder::select_columns("t_tag", "label");
    finder.append("WHERE id = ?", values![tag.id.as_str()]);
    let label: Option<String> = db.query_one(&mut scope, &mut finder).await?;
    assert_eq!(label.as_deref(), Some("rust"));
    Ok(())
}

#[tokio::test]
async fn test_update_and_update_non_null() -> Result<(), Box<dyn std::error::Error>> {
    let db = setup().await?;
    let mut scope = Scope::new();

    let mut user = User { name: "carol".into(), nickname: Some("c".into()), score: 2.0, ..Default::default() };
    db.transaction(&mut scope, async |scope: &mut Scope| db.insert(scope, &mut user).await).await?;

    // A None field is skipped by the non-null update
    let partial = User { id: user.id, name: "caroline".into(), nickname: None, score: 4.0 };
    let affected = db.transaction(&mut scope, async |scope: &mut Scope| db.update_non_null(scope, &partial).await).await?;
    assert_eq!(affected, 1);

    let fetched = find_user(&db, &mut scope, user.id).await?.unwrap();
    assert_eq!(fetched.name, "caroline");
    assert_eq!(fetched.nickname.as_deref(), Some("c"));
    assert_eq!(fetched.score, 4.0);

    // The full update writes NULL
    let affected = db.transaction(&mut scope, async |scope: &mut Scope| db.update(scope, &partial).await).await?;
    assert_eq!(affected, 1);

    let fetched = find_user(&db, &mut scope, user.id).await?.unwrap();
    assert_eq!(fetched.nickname, None);
    Ok(())
}

#[tokio::test]
async fn test_delete_by_key() -> Result<(), Box<dyn std::error::Error>> {
    let db = setup().await?;
    let mut scope = Scope::new();

    let mut users = vec![
        User { name: "a".into(), ..Default::default() },
        User { name: "b".into(), ..Default::default() },
    ];
    db.transaction(&mut scope, async |scope: &mut Scope| {
        for user in users.iter_mut() {
            db.insert(scope, user).await?;
        }
        Ok(())
    })
    .await?;

    let affected = db.transaction(&mut scope, async |scope: &mut Scope| db.delete(scope, &users[0]).await).await?;
    assert_eq!(affected, 1);

    assert!(find_user(&db, &mut scope, users[0].id).await?.is_none());
    assert!(find_user(&db, &mut scope, users[1].id).await?.is_some());
    Ok(())
}

#[tokio::test]
async fn test_insert_batch() -> Result<(), Box<dyn std::error::Error>> {
    let db = setup().await?;
    let mut scope = Scope::new();

    let mut users: Vec<User> =
        ["x", "y", "z"].iter().map(|name| User { name: name.to_string(), ..Default::default() }).collect();
    let mut none: Vec<User> = Vec::new();

    let (inserted, empty) = db
        .transaction(&mut scope, async |scope: &mut Scope| {
            let inserted = db.insert_batch(scope, &mut users).await?;
            let empty = db.insert_batch(scope, &mut none).await?;
            Ok((inserted, empty))
        })
        .await?;
    assert_eq!(inserted, 3);
    assert_eq!(empty, 0);

    let mut finder = Finder::new();
    finder.append("SELECT COUNT(*) FROM t_user", values![]);
    let count: Option<i64> = db.query_one(&mut scope, &mut finder).await?;
    assert_eq!(count, Some(3));
    Ok(())
}

#[tokio::test]
async fn test_entity_map_insert_and_update() -> Result<(), Box<dyn std::error::Error>> {
    let db = setup().await?;
    let mut scope = Scope::new();

    let mut map = EntityMap::new("t_user").with_primary_key("id");
    map.set("name", "dave")?.set("score", 7.5)?;

    db.transaction(&mut scope, async |scope: &mut Scope| db.insert_map(scope, &mut map).await).await?;

    let id = match map.get("id") {
        Some(Value::Int(id)) => *id,
        other => panic!("expected generated key, got {:?}", other),
    };

    map.set("nickname", "d")?;
    let affected = db.transaction(&mut scope, async |scope: &mut Scope| db.update_map(scope, &map).await).await?;
    assert_eq!(affected, 1);

    let fetched = find_user(&db, &mut scope, id).await?.unwrap();
    assert_eq!(fetched.name, "dave");
    assert_eq!(fetched.nickname.as_deref(), Some("d"));
    assert_eq!(fetched.score, 7.5);
    Ok(())
}

#[tokio::test]
async fn test_write_outside_transaction_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let db = setup().await?;
    let mut scope = Scope::new();

    let mut user = User { name: "eve".into(), ..Default::default() };
    let err = db.insert(&mut scope, &mut user).await.unwrap_err();
    assert!(matches!(err, Error::Propagation(_)));

    let mut finder = Finder::delete("t_user");
    let err = db.execute(&mut scope, &mut finder).await.unwrap_err();
    assert!(matches!(err, Error::Propagation(_)));
    Ok(())
}

#[tokio::test]
async fn test_disable_transaction_allows_bare_writes() -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::builder().max_connections(1).disable_transaction(true).connect("sqlite::memory:").await?;
    sqlx::query("CREATE TABLE t_tag (id TEXT PRIMARY KEY, label TEXT NOT NULL)").execute(db.pool()).await?;

    let mut scope = Scope::new();
    let mut tag = Tag { id: "t1".into(), label: "bare".into() };
    assert_eq!(db.insert(&mut scope, &mut tag).await?, 1);
    assert!(!scope.in_transaction());
    Ok(())
}

#[tokio::test]
async fn test_zero_datetime_reads_back_as_sentinel() -> Result<(), Box<dyn std::error::Error>> {
    let db = setup().await?;
    let mut scope = Scope::new();

    let happened = Utc.with_ymd_and_hms(2024, 5, 17, 8, 30, 0).unwrap();
    let mut blank = Event::default();
    let mut dated = Event { happened_at: happened, logged_at: happened.naive_utc(), ..Default::default() };

    db.transaction(&mut scope, async |scope: &mut Scope| {
        db.insert(scope, &mut blank).await?;
        db.insert(scope, &mut dated).await?;
        Ok(())
    })
    .await?;

    let mut finder = Finder::select("t_event");
    finder.append("WHERE id = ?", values![blank.id]);
    let fetched: Event = db.query_one(&mut scope, &mut finder).await?.unwrap();
    assert_eq!(fetched.happened_at, temporal::zero_date_sentinel());
    assert_eq!(fetched.logged_at, temporal::zero_naive_sentinel());

    let mut finder = Finder::select("t_event");
    finder.append("WHERE id = ?", values![dated.id]);
    let fetched: Event = db.query_one(&mut scope, &mut finder).await?.unwrap();
    assert_eq!(fetched.happened_at, happened);
    assert_eq!(fetched.logged_at, happened.naive_utc());
    Ok(())
}
