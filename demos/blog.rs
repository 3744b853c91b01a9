use sqlx_context_db::{
    create_engine, insert, next_id, params, select_all, select_int, select_one, update,
    with_transaction, EngineConfig, Error, Value,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();
    env_logger::init();

    let config = match EngineConfig::from_env() {
        Ok(config) => config,
        Err(_) => EngineConfig::new("root", "password", "test"),
    };
    create_engine(config)?;

    println!("=== Blog Example ===\n");

    update("drop table if exists blog_user", &[]).await?;
    update(
        "create table blog_user (id varchar(50) primary key, name text, email text)",
        &[],
    )
    .await?;
    update("drop table if exists blog_post", &[]).await?;
    update(
        "create table blog_post (id varchar(50) primary key, user_id varchar(50), title text)",
        &[],
    )
    .await?;

    // Example 1: Auto-committed insert
    println!("1. Creating a user...");
    let alice = next_id();
    insert(
        "blog_user",
        [
            ("id", Value::from(alice.as_str())),
            ("name", "Alice".into()),
            ("email", "alice@example.com".into()),
        ],
    )
    .await?;
    println!("   ✓ User created with ID: {}\n", alice);

    // Example 2: Nested transactions share one commit
    println!("2. Creating a user with two posts...");
    let bob = next_id();
    with_transaction(|| async {
        insert("blog_user", [("id", Value::from(bob.as_str())), ("name", "Bob".into())]).await?;
        for title in ["Hello", "Again"] {
            publish(&bob, title).await?;
        }
        Ok::<_, Error>(())
    })
    .await?;
    println!("   ✓ User and posts committed together\n");

    // Example 3: A failing transaction leaves nothing behind
    println!("3. Creating a user, then failing...");
    let carol = next_id();
    let result = with_transaction(|| async {
        insert("blog_user", [("id", Value::from(carol.as_str())), ("name", "Carol".into())])
            .await?;
        publish(&carol, "Never published").await?;
        Err::<(), _>(Error::Config("simulated failure".into()))
    })
    .await;
    let carol_row = select_one("select * from blog_user where id = ?", &params![carol.as_str()]).await?;
    println!(
        "   ✓ Transaction failed ({}), row present: {}\n",
        result.unwrap_err(),
        carol_row.is_some()
    );

    // Example 4: Reading back
    println!("4. Listing posts...");
    for post in select_all("select title from blog_post order by id", &[]).await? {
        println!("   - {}", post.get_as::<String>("title")?);
    }
    let users = select_int("select count(*) from blog_user", &[])
        .await?
        .unwrap_or(0);
    println!("   ✓ {} users in total\n", users);

    println!("=== All examples completed ===");
    Ok(())
}

async fn publish(user_id: &str, title: &str) -> Result<u64, Error> {
    // joins the caller's transaction
    with_transaction(|| async {
        insert(
            "blog_post",
            [
                ("id", Value::from(next_id())),
                ("user_id", user_id.into()),
                ("title", title.into()),
            ],
        )
        .await
    })
    .await
}
