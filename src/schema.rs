// OpenWrite schema - story graph and codex tables for Diesel ORM

diesel::table! {
    projects (id) {
        id -> Integer,
        name -> Text,
        description -> Nullable<Text>,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    works (id) {
        id -> Integer,
        project_id -> Integer,
        title -> Text,
        description -> Nullable<Text>,
        status -> Text,
        order_index -> Integer,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    chapters (id) {
        id -> Integer,
        work_id -> Integer,
        title -> Text,
        summary -> Nullable<Text>,
        content -> Nullable<Text>,
        order_index -> Integer,
        word_count -> Integer,
        created_at -> Text,
        updated_at -> Text,
    }
}

// ============================================================================
// Codex Tables - characters, locations, plot points, lore
//
// Each row belongs to exactly one project OR one work (CHECK-constrained).
// ============================================================================

diesel::table! {
    characters (id) {
        id -> Integer,
        project_id -> Nullable<Integer>,
        work_id -> Nullable<Integer>,
        name -> Text,
        description -> Nullable<Text>,
        role -> Nullable<Text>,
        metadata_json -> Nullable<Text>,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    locations (id) {
        id -> Integer,
        project_id -> Nullable<Integer>,
        work_id -> Nullable<Integer>,
        name -> Text,
        description -> Nullable<Text>,
        metadata_json -> Nullable<Text>,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    plot_points (id) {
        id -> Integer,
        project_id -> Nullable<Integer>,
        work_id -> Nullable<Integer>,
        title -> Text,
        description -> Nullable<Text>,
        status -> Text,
        metadata_json -> Nullable<Text>,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    lore_entries (id) {
        id -> Integer,
        project_id -> Nullable<Integer>,
        work_id -> Nullable<Integer>,
        title -> Text,
        description -> Nullable<Text>,
        metadata_json -> Nullable<Text>,
        created_at -> Text,
        updated_at -> Text,
    }
}

// ============================================================================
// Story Graph Tables - canvas nodes, prose blocks, typed connections
// ============================================================================

diesel::table! {
    graph_nodes (id) {
        id -> Integer,
        project_id -> Integer,
        node_type -> Text,
        subtype -> Nullable<Text>,
        title -> Text,
        description -> Nullable<Text>,
        position_x -> Double,
        position_y -> Double,
        visual_style_json -> Nullable<Text>,
        metadata_json -> Nullable<Text>,
        word_count -> Integer,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    text_blocks (id) {
        id -> Integer,
        node_id -> Integer,
        content -> Text,
        order_index -> Integer,
        word_count -> Integer,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    graph_connections (id) {
        id -> Integer,
        project_id -> Integer,
        from_node_id -> Integer,
        to_node_id -> Integer,
        connection_type -> Text,
        strength -> Integer,
        visual_style_json -> Nullable<Text>,
        metadata_json -> Nullable<Text>,
        created_at -> Text,
        updated_at -> Text,
    }
}

// ============================================================================
// AI Provider Credentials - plain CRUD records, no token exchange
// ============================================================================

diesel::table! {
    ai_providers (id) {
        id -> Integer,
        name -> Text,
        provider_kind -> Text,
        base_url -> Nullable<Text>,
        api_key -> Nullable<Text>,
        enabled -> Bool,
        created_at -> Text,
        updated_at -> Text,
    }
}
