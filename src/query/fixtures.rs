//! Shared schema set for unit tests

use crate::schema::{
    FieldDescriptor, FieldType, ModelSchema, RelationshipDescriptor, RelationshipKind,
    SchemaBundle, SchemaLoader,
};

pub(crate) fn users() -> ModelSchema {
    ModelSchema::new(
        "Users",
        "users",
        vec![
            FieldDescriptor::new("id", FieldType::Id),
            FieldDescriptor::new("first_name", FieldType::Text),
            FieldDescriptor::new("last_name", FieldType::Text),
            FieldDescriptor::new("email", FieldType::Email),
            FieldDescriptor::new("password", FieldType::Password),
            FieldDescriptor::new("avatar", FieldType::Image),
            FieldDescriptor::new("status", FieldType::Enum),
            FieldDescriptor::new("created_at", FieldType::DateTime),
        ],
    )
    .with_relationships(&["users_roles"])
    .with_display_columns(&["first_name", "last_name", "avatar"])
}

pub(crate) fn roles() -> ModelSchema {
    ModelSchema::new(
        "Roles",
        "roles",
        vec![
            FieldDescriptor::new("id", FieldType::Id),
            FieldDescriptor::new("name", FieldType::Text),
        ],
    )
    .with_relationships(&["users_roles"])
    .with_display_columns(&["name"])
}

pub(crate) fn movies() -> ModelSchema {
    ModelSchema::new(
        "Movies",
        "movies",
        vec![
            FieldDescriptor::new("id", FieldType::Id),
            FieldDescriptor::new("name", FieldType::Text),
            FieldDescriptor::new("year", FieldType::Integer),
            FieldDescriptor::new("rating", FieldType::Float),
            FieldDescriptor::new("genres", FieldType::MultiEnum),
            FieldDescriptor::new("released_on", FieldType::Date),
            FieldDescriptor::new("deleted_at", FieldType::DateTime),
            FieldDescriptor::related("created_by", "Users"),
        ],
    )
    .with_relationships(&["movies_movie_quotes"])
    .with_display_columns(&["name"])
}

pub(crate) fn movie_quotes() -> ModelSchema {
    ModelSchema::new(
        "Movie_Quotes",
        "movie_quotes",
        vec![
            FieldDescriptor::new("id", FieldType::Id),
            FieldDescriptor::new("quote", FieldType::BigText),
            FieldDescriptor::new("character", FieldType::Text),
            FieldDescriptor::new("deleted_at", FieldType::DateTime),
            FieldDescriptor::related("author_id", "Users"),
        ],
    )
    .with_relationships(&["movies_movie_quotes", "quote_author"])
    .with_display_columns(&["character"])
}

pub(crate) fn relationships() -> Vec<RelationshipDescriptor> {
    vec![
        RelationshipDescriptor::junction(
            "users_roles",
            RelationshipKind::ManyToMany,
            "rel_users_roles",
            ("Users", "users_id"),
            ("Roles", "roles_id"),
        )
        .with_additional_fields(vec![FieldDescriptor::new("is_primary", FieldType::Boolean)]),
        RelationshipDescriptor::junction(
            "movies_movie_quotes",
            RelationshipKind::OneToMany,
            "rel_movies_movie_quotes",
            ("Movies", "movies_id"),
            ("Movie_Quotes", "movie_quotes_id"),
        ),
        RelationshipDescriptor::direct(
            "quote_author",
            RelationshipKind::OneToOne,
            ("Movie_Quotes", "author_id"),
            ("Users", "id"),
        ),
    ]
}

/// Everything above as one on-disk bundle
pub(crate) fn bundle() -> SchemaBundle {
    SchemaBundle {
        models: vec![users(), roles(), movies(), movie_quotes()],
        relationships: relationships(),
    }
}

pub(crate) fn registry() -> SchemaLoader {
    let mut loader = SchemaLoader::in_memory();
    loader.register_bundle(bundle()).unwrap();
    loader.verify_references().unwrap();
    loader
}
