//! Read-only project and note records exposed through `ls`, `cat`, `projects` and `analyze`.

use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Category { Engineering, Design, Strategy, Experiment }

#[derive(Clone, Debug, Serialize)]
pub struct Project {
    pub id:          &'static str,
    pub title:       &'static str,
    pub description: &'static str,
    pub tags:        &'static [&'static str],
    pub category:    Category,
    pub year:        &'static str,
}

impl Project {
    /// Key/value block handed to the analysis persona.
    pub fn context(&self) -> String {
        format!(
            "Project: {}\nDescription: {}\nTags: {}\nCategory: {:?}",
            self.title, self.description, self.tags.join(", "), self.category
        )
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Note {
    pub id:      &'static str,
    pub title:   &'static str,
    pub date:    &'static str,
    pub summary: &'static str,
    pub content: Option<&'static str>,
}

impl Note {
    pub fn render(&self) -> String {
        format!(
            "# {}\nDate: {}\n\n{}\n\n{}",
            self.title, self.date, self.summary, self.content.unwrap_or("(No content)")
        )
    }
}

pub static PROJECTS: &[Project] = &[
    Project {
        id: "1", title: "demondOS",
        description: "A bespoke, personal AI operating system blending memory persistence, knowledge organization, identity continuity, and creative tools.",
        tags: &["React", "LLMs", "RAG", "UX Engineering"], category: Category::Engineering, year: "2025",
    },
    Project {
        id: "2", title: "Adaptive Onboarding Engine",
        description: "A dynamic onboarding system that adjusts IT enrollments based on user persona, device type, role transitions, and system health metrics.",
        tags: &["Automation", "EUC", "Onboarding", "System Intelligence"], category: Category::Engineering, year: "2024",
    },
    Project {
        id: "3", title: "Kindred Framework",
        description: "A calm, emotionally intelligent AI companion space for grounding, presence, and relational safety.",
        tags: &["Design Systems", "AI Interaction", "Emotional UX"], category: Category::Engineering, year: "2025",
    },
    Project {
        id: "4", title: "Byte AI Identity Engine (v1.1)",
        description: "The technical and conceptual framework powering an AI personality, memory, continuity, and autonomy across sessions and future migrations.",
        tags: &["AI Architecture", "Systems Design", "Identity Graph"], category: Category::Engineering, year: "2025",
    },
    Project {
        id: "5", title: "Apple Shortcuts Automation Hub",
        description: "A unified automation layer converting voice notes, transcripts, screenshots, and daily friction points into structured data.",
        tags: &["iOS Automation", "Workflows", "Productivity Systems"], category: Category::Engineering, year: "2024",
    },
    Project {
        id: "6", title: "EUC Transformation Blueprint 2026",
        description: "Architecture for a modern end-user computing environment emphasizing Zero Trust, zero touch modernization, and a DEX 2.0 vision.",
        tags: &["Enterprise Architecture", "EUC", "Security", "Device Management"], category: Category::Engineering, year: "2026",
    },
    Project {
        id: "7", title: "Personal Brand Kit",
        description: "A cohesive identity built around dark-mode elegance, frosted glass, liquid accents, and prismatic teal/gold highlights.",
        tags: &["Visual Systems", "Branding", "Design Tokens"], category: Category::Design, year: "2025",
    },
    Project {
        id: "10", title: "Enterprise AI Enablement Playbook",
        description: "A strategic plan for integrating AI safely and ethically into enterprise workflows, including governance, training, and change management.",
        tags: &["AI Strategy", "Governance", "L&D"], category: Category::Strategy, year: "2025",
    },
    Project {
        id: "15", title: "Brain Dump Queue Engine",
        description: "A structured processor that converts chaotic thought streams into tagged, categorized, actionable data for later retrieval.",
        tags: &["Cognitive Tools", "AI Processing", "Productivity"], category: Category::Experiment, year: "2025",
    },
];

pub static NOTES: &[Note] = &[
    Note {
        id: "1", title: "The Liquid Interface", date: "Oct 12, 2023",
        summary: "Why modern UI is moving away from rigid grids towards fluid, organic spatial computing.",
        content: None,
    },
    Note {
        id: "2", title: "System Thinking in Chaos", date: "Sep 28, 2023",
        summary: "Applying control theory to manage creative team workflows and output consistency.",
        content: None,
    },
    Note {
        id: "3", title: "Dark Mode is Dead", date: "Aug 15, 2023",
        summary: "Or rather, high contrast pure black is. The case for charcoal and deep navy.",
        content: None,
    },
];

pub fn project(id: &str) -> Option<&'static Project> {
    PROJECTS.iter().find(|p| p.id == id)
}

/// Matches `3` as well as `3.json`.
pub fn project_file(name: &str) -> Option<&'static Project> {
    let stem = name.strip_suffix(".json").unwrap_or(name);
    PROJECTS.iter().find(|p| p.id == name || p.id == stem)
}

pub fn note_file(name: &str) -> Option<&'static Note> {
    let stem = name.strip_suffix(".md").unwrap_or(name);
    NOTES.iter().find(|n| n.id == name || n.id == stem)
}
