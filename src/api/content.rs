use axum::{response::IntoResponse, Json};
use serde_json::json;

// static marketing content served as-is; curated by hand for now
pub async fn success_stories() -> impl IntoResponse {
    Json(json!({
        "stories": [
            {
                "id": 1,
                "title": "Coffee Roastery in Musanze",
                "jobs_created": 12,
                "raised_rwf": 8_400_000u64,
                "entrepreneur": "Jean Paul",
                "quote": "This platform turned my idea into 12 real jobs for youth in my village."
            },
            {
                "id": 2,
                "title": "Tech Training Hub in Kigali",
                "jobs_created": 8,
                "raised_rwf": 6_200_000u64,
                "entrepreneur": "Aline U.",
                "quote": "We now employ 8 young developers full-time thanks to our backers."
            }
        ]
    }))
}
