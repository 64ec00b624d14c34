use clap::Parser;

use chathub::db;
use chathub::models::room::{CreateRoom, MemberRole};
use chathub::models::user::CreateUser;

/// Loads a small fixture set (users, one room) for local development.
#[derive(Parser)]
#[command(name = "chathub-seed", about = "Seed a chathub database with test users and a room")]
struct Args {
    /// Database URL; defaults to $DATABASE_URL, then the server default.
    #[arg(long)]
    database_url: Option<String>,

    /// Number of users to create.
    #[arg(long, default_value_t = 3)]
    users: usize,

    /// Name of a room joined by every seeded user. Skipped when empty.
    #[arg(long, default_value = "lobby")]
    room: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let database_url = args
        .database_url
        .or_else(|| std::env::var("DATABASE_URL").ok())
        .unwrap_or_else(|| "sqlite:chathub.db?mode=rwc".to_string());

    let pool = db::create_pool(&database_url).await?;

    let mut user_ids = Vec::with_capacity(args.users);
    for n in 1..=args.users {
        let user = db::users::create_user(
            &pool,
            &CreateUser {
                display_name: format!("user{n}"),
            },
        )
        .await?;
        println!("user    {:>6}  {}", user.id, user.display_name);
        user_ids.push(user.id);
    }

    if let (false, Some((&owner_id, rest))) = (args.room.is_empty(), user_ids.split_first()) {
        let room = db::rooms::create_room(
            &pool,
            &CreateRoom {
                name: args.room.clone(),
                description: None,
                owner_id,
                is_public: Some(true),
            },
        )
        .await?;
        for &user_id in rest {
            db::rooms::add_member(&pool, room.id, user_id, MemberRole::Member).await?;
        }
        println!("room    {:>6}  {} ({} members)", room.id, room.name, user_ids.len());
    }

    Ok(())
}
