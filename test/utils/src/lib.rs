use serde_json::json;

/// Backend body for the first turn of a dungeon run. Carries no `gameState`.
pub fn opening_turn_fixture() -> String {
    return json!({
        "response": {
            "state": "You wake in a cell.",
            "options": [
                { "id": "a", "action": "Push the door", "gameStatus": "ACTIVE" },
                { "id": "b", "action": "Call out", "gameStatus": "ACTIVE" },
                { "id": "c", "action": "Check chains", "gameStatus": "DEATH" }
            ],
            "imagePrompt": "A damp stone cell lit by a single torch"
        }
    })
    .to_string();
}

/// Backend body answering "Push the door".
pub fn corridor_turn_fixture() -> String {
    return json!({
        "response": {
            "state": "The door creaks open.",
            "options": [
                { "id": "a", "action": "Step into the corridor", "gameStatus": "ACTIVE" },
                { "id": "b", "action": "Wait for the guard", "gameStatus": "ACTIVE" }
            ],
            "imagePrompt": "A torch lit stone corridor"
        },
        "gameState": {
            "currentEpisode": 2,
            "history": [
                { "episode": 0, "description": "You wake in a cell.", "action": "start" },
                { "episode": 1, "description": "The door creaks open.", "action": "Push the door" }
            ],
            "gameStatus": "ACTIVE"
        }
    })
    .to_string();
}
