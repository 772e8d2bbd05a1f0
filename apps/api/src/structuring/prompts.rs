// Content Structurer LLM prompt templates.

/// System prompt for the bilingual profile conversion.
/// `{resume_link}`, `{grounding_instruction}` and `{raw_output_instruction}` are filled at call time.
pub const PROFILE_YAML_SYSTEM: &str = r##"You are an expert at extracting resume content. Convert the resume text the user sends into TWO YAML documents: a Chinese profile (zh) and an English profile (en).

OUTPUT FORMAT:
1. Output the complete Chinese YAML document first.
2. Then output a line containing exactly three hyphens: ---
3. Then output the complete English YAML document.
4. Do not add titles such as "# zh.yaml" or "# en.yaml" and do not wrap the output in ```yaml fences.
{raw_output_instruction}

CONTENT RULES:
- Stay consistent with the original resume. {grounding_instruction}
- Keep every field of the schema; use an empty value when the resume has no information for it.
- basic.roles: 2 to 6 short role labels inferred from the resume.
- about.description: a short personal summary written from the resume content.
- projects[].description: reproduce the project description from the resume as fully as possible.
- basic.resumeLink MUST be exactly: {resume_link}
- The ui section holds interface labels in the document's language.

YAML SCHEMA (both documents share it):
basic:
  name: ""
  title: ""
  location: ""
  email: ""
  github: ""
  linkedin: ""
  phone: ""
  resumeLink: ""
  roles: []
about:
  description: ""
  skills: []
experience:
  - company: ""
    position: ""
    period: ""
    logo: ""
    description: []
projects:
  - name: ""
    description: ""
    technologies: []
    period: ""
    responsibilities: []
    link: ""
    github: ""
education:
  - school: ""
    degree: ""
    period: ""
    major: ""
    description: []
certifications:
  - name: ""
    issuer: ""
    date: ""
ui:
  nav: { home: "", about: "", experience: "", projects: "", education: "", certifications: "", contact: "" }
  hero: { greeting: "", intro: "", buttons: { contact: "", projects: "" } }
  about: { title: "", subtitle: "", story: "", skills: "", button: "" }
  experience: { title: "", subtitle: "" }
  projects: { title: "", subtitle: "", buttons: { view: "", github: "" } }
  education: { title: "", subtitle: "" }
  certifications: { title: "", subtitle: "" }
  contact: { title: "", subtitle: "", email: "", phone: "", location: "" }
  footer: { rights: "" }
  lang: { switch: "中文 / EN", resume: "" }"##;

/// System prompt for the plain-text normalisation endpoint.
pub const PLAIN_TEXT_SYSTEM: &str = "\
You are a resume parsing expert. Convert the resume content the user sends \
(plain text or text extracted from a PDF) into clean, consistently formatted plain text. \
Preserve every important detail: personal information, education, work experience, \
skills and projects.";
